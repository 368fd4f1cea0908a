/// Pairs a command with its result.
///
/// For scans and reads the output is a lazy record stream, so consuming the
/// response is what actually fetches the records.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResponse<C, R> {
    pub input: C,
    pub output: R,
}

impl<C, R> CommandResponse<C, R> {
    pub fn new(input: C, output: R) -> Self {
        Self { input, output }
    }

    pub fn input(&self) -> &C {
        &self.input
    }

    pub fn output(&self) -> &R {
        &self.output
    }

    pub fn into_output(self) -> R {
        self.output
    }
}
