use std::sync::Arc;

use crate::value::Value;

/// A compiled code object: the opcode byte sequence, its constant pool and
/// symbol tables, a snapshot of the source text, and a mapping from
/// instruction offsets to source lines.
#[derive(Debug)]
pub struct Code {
    name: String,
    bytecode: Vec<u8>,
    constants: Vec<Value>,
    local_names: Vec<String>,
    free_names: Vec<String>,
    /// Local slots that hold shared cells, initialized at frame entry.
    cell_slots: Vec<u8>,
    /// Global symbol names; populated only for top-level code.
    global_names: Vec<String>,
    source: Arc<str>,
    /// `(instruction offset, one-based source line)`, offset-ascending.
    lines: Vec<(u32, u32)>,
}

impl Code {
    #[expect(clippy::too_many_arguments, reason = "assembled once, by the builder")]
    pub(crate) fn new(
        name: String,
        bytecode: Vec<u8>,
        constants: Vec<Value>,
        local_names: Vec<String>,
        free_names: Vec<String>,
        cell_slots: Vec<u8>,
        global_names: Vec<String>,
        source: Arc<str>,
        lines: Vec<(u32, u32)>,
    ) -> Self {
        Self {
            name,
            bytecode,
            constants,
            local_names,
            free_names,
            cell_slots,
            global_names,
            source,
            lines,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn bytecode(&self) -> &[u8] {
        &self.bytecode
    }

    #[must_use]
    pub fn constant(&self, index: u16) -> Option<&Value> {
        self.constants.get(index as usize)
    }

    #[must_use]
    pub fn locals_count(&self) -> usize {
        self.local_names.len()
    }

    #[must_use]
    pub fn local_names(&self) -> &[String] {
        &self.local_names
    }

    #[must_use]
    pub fn free_names(&self) -> &[String] {
        &self.free_names
    }

    #[must_use]
    pub fn cell_slots(&self) -> &[u8] {
        &self.cell_slots
    }

    #[must_use]
    pub fn global_names(&self) -> &[String] {
        &self.global_names
    }

    #[must_use]
    pub fn source(&self) -> Arc<str> {
        Arc::clone(&self.source)
    }

    /// The one-based source line for an instruction offset.
    #[must_use]
    pub fn line_for_offset(&self, offset: usize) -> u32 {
        let offset = offset as u32;
        match self.lines.binary_search_by_key(&offset, |(o, _)| *o) {
            Ok(i) => self.lines[i].1,
            Err(0) => 1,
            Err(i) => self.lines[i - 1].1,
        }
    }

    /// The compiled function prototypes held in the constant pool.
    #[must_use]
    pub fn function_constants(&self) -> Vec<Arc<Code>> {
        self.constants
            .iter()
            .filter_map(|constant| match constant {
                Value::Function(function) => Some(Arc::clone(function.code())),
                _ => None,
            })
            .collect()
    }

    /// A one-instruction-per-line listing, for debugging and tracing.
    #[must_use]
    pub fn disassemble(&self) -> String {
        use super::op::Opcode;
        let mut out = String::new();
        let mut offset = 0;
        while offset < self.bytecode.len() {
            let Some(op) = Opcode::from_repr(self.bytecode[offset]) else {
                out.push_str(&format!("{offset:04} <invalid {}>\n", self.bytecode[offset]));
                offset += 1;
                continue;
            };
            out.push_str(&format!("{offset:04} {op}"));
            let operands = op.operand_bytes();
            for byte in &self.bytecode[offset + 1..offset + 1 + operands] {
                out.push_str(&format!(" {byte}"));
            }
            out.push('\n');
            offset += 1 + operands;
        }
        out
    }
}
