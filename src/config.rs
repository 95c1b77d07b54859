/// Knobs that change how comparisons compile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileConfig {
    /// `==`/`!=` on a string attribute whose value contains `*` compile as LIKE/NOT LIKE
    pub wildcard_equality: bool,
    /// Treat every string attribute as case-insensitive
    pub case_insensitive_strings: bool,
}

impl CompileConfig {
    pub fn with_wildcard_equality(mut self, on: bool) -> Self {
        self.wildcard_equality = on;
        self
    }

    pub fn with_case_insensitive_strings(mut self, on: bool) -> Self {
        self.case_insensitive_strings = on;
        self
    }
}
