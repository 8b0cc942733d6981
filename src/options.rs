//! Configuration options for the lookaside cache.

/// Default bound of the background population channel.
pub const DEFAULT_POPULATION_BUFFER: usize = 1024;

/// Default name of the background population thread.
pub const DEFAULT_POPULATION_THREAD_NAME: &str = "cellscope-populate";

/// Cache configuration options.
#[derive(Debug, Clone)]
pub struct Options {
    /// Number of row keys the background population may queue ahead of
    /// the consumer.
    pub population_buffer: usize,

    /// Name given to background population threads.
    pub population_thread_name: String,

    /// Reject writes to families that were never listed.
    pub check_families_on_write: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            population_buffer: DEFAULT_POPULATION_BUFFER,
            population_thread_name: DEFAULT_POPULATION_THREAD_NAME.to_string(),
            check_families_on_write: true,
        }
    }
}

impl Options {
    /// Create new options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the options.
    pub fn validate(&self) -> crate::Result<()> {
        if self.population_buffer == 0 {
            return Err(crate::Error::InvalidConfiguration(
                "population_buffer must be at least 1".into(),
            ));
        }

        if self.population_thread_name.trim().is_empty() {
            return Err(crate::Error::InvalidConfiguration(
                "population_thread_name must not be empty".into(),
            ));
        }

        Ok(())
    }
}

/// Builder for Options.
#[derive(Debug, Clone, Default)]
pub struct OptionsBuilder {
    options: Options,
}

impl OptionsBuilder {
    /// Create a new builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set population_buffer.
    pub fn population_buffer(mut self, size: usize) -> Self {
        self.options.population_buffer = size;
        self
    }

    /// Set population_thread_name.
    pub fn population_thread_name(mut self, name: impl Into<String>) -> Self {
        self.options.population_thread_name = name.into();
        self
    }

    /// Set check_families_on_write.
    pub fn check_families_on_write(mut self, value: bool) -> Self {
        self.options.check_families_on_write = value;
        self
    }

    /// Build the options.
    pub fn build(self) -> crate::Result<Options> {
        self.options.validate()?;
        Ok(self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = Options::default();
        assert_eq!(opts.population_buffer, DEFAULT_POPULATION_BUFFER);
        assert_eq!(opts.population_thread_name, DEFAULT_POPULATION_THREAD_NAME);
        assert!(opts.check_families_on_write);
    }

    #[test]
    fn test_options_validation() {
        let mut opts = Options::default();
        assert!(opts.validate().is_ok());

        opts.population_buffer = 0;
        assert!(opts.validate().is_err());

        opts.population_buffer = 1;
        opts.population_thread_name = "  ".into();
        assert!(opts.validate().is_err());
    }

    #[test]
    fn test_builder() {
        let opts = OptionsBuilder::new()
            .population_buffer(16)
            .population_thread_name("scan")
            .check_families_on_write(false)
            .build()
            .unwrap();

        assert_eq!(opts.population_buffer, 16);
        assert_eq!(opts.population_thread_name, "scan");
        assert!(!opts.check_families_on_write);

        assert!(OptionsBuilder::new().population_buffer(0).build().is_err());
    }
}
