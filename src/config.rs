/// Construction-time interpreter settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// Recognize `define`, `let`, `letrec` and named `let` as sugar for the
    /// core binding forms. When off, those names are ordinary variables.
    /// Fixed for the lifetime of the interpreter.
    pub sugar: bool,
    /// Maximum number of live heap objects.
    pub heap_capacity: usize,
    /// Allocations between collections (adjusted upward under pressure).
    pub gc_threshold: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            sugar: true,
            heap_capacity: 16 * 1024 * 1024,
            gc_threshold: 64 * 1024,
        }
    }
}
