use crate::value::Value;

/// Hand-off area for multiple return values.
///
/// A producer stores its values here and returns `Value::MultipleValues`;
/// the consumer that receives the marker must read the buffer before any
/// further evaluation happens. At most one multi-valued result is
/// outstanding at a time.
#[derive(Debug, Default)]
pub struct ValuesBuffer {
    slots: Vec<Value>,
    count: usize,
}

impl ValuesBuffer {
    pub fn new() -> Self {
        ValuesBuffer {
            slots: Vec::with_capacity(8),
            count: 0,
        }
    }

    /// Overwrite the buffer with `values`, growing it when undersized.
    pub fn store(&mut self, values: &[Value]) {
        if self.slots.len() < values.len() {
            self.slots.resize(values.len(), Value::Void);
        }
        self.slots[..values.len()].copy_from_slice(values);
        self.count = values.len();
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The values currently held.
    pub fn live(&self) -> &[Value] {
        &self.slots[..self.count]
    }

    /// Read the values out and release them.
    pub fn take(&mut self) -> Vec<Value> {
        let values = self.live().to_vec();
        self.count = 0;
        values
    }
}
