//! Shared value types for the parley chat abstraction crates.
//!
//! ```rust
//! use pcommon::{GenerationOptions, MetadataMap};
//!
//! let mut metadata = MetadataMap::new();
//! metadata.insert("source".to_string(), "widget".to_string());
//!
//! let options = GenerationOptions::default().with_temperature(0.3).enable_streaming();
//! assert_eq!(options.temperature, Some(0.3));
//! assert!(options.stream);
//! ```

pub mod future {
    //! Shared async future aliases.
    //!
    //! ```rust
    //! use pcommon::BoxFuture;
    //!
    //! fn str_len<'a>(value: &'a str) -> BoxFuture<'a, usize> {
    //!     Box::pin(async move { value.len() })
    //! }
    //!
    //! let _future = str_len("hello");
    //! ```

    use std::future::Future;
    use std::pin::Pin;

    pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
}

pub mod context {
    //! Shared metadata mapping attached to messages and requests.

    use std::collections::HashMap;

    pub type MetadataMap = HashMap<String, String>;
}

pub mod model {
    //! Shared sampling settings used by request types.
    //!
    //! `None` fields mean "defer to the bound configuration"; `Some` values
    //! are per-call overrides.
    //!
    //! ```rust
    //! use pcommon::GenerationOptions;
    //!
    //! let options = GenerationOptions::default()
    //!     .with_temperature(0.2)
    //!     .with_max_tokens(128);
    //!
    //! assert_eq!(options.temperature, Some(0.2));
    //! assert_eq!(options.max_tokens, Some(128));
    //! assert!(!options.stream);
    //! ```

    #[derive(Debug, Clone, Copy, PartialEq, Default)]
    pub struct GenerationOptions {
        pub temperature: Option<f32>,
        pub max_tokens: Option<u32>,
        pub stream: bool,
    }

    impl GenerationOptions {
        pub fn with_temperature(mut self, temperature: f32) -> Self {
            self.temperature = Some(temperature);
            self
        }

        pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
            self.max_tokens = Some(max_tokens);
            self
        }

        pub fn with_streaming(mut self, stream: bool) -> Self {
            self.stream = stream;
            self
        }

        pub fn enable_streaming(self) -> Self {
            self.with_streaming(true)
        }
    }
}

pub use context::MetadataMap;
pub use future::BoxFuture;
pub use model::GenerationOptions;
