//! # serdes-guard-validators
//!
//! Validator capabilities and the path-keyed map that decides where they
//! run.
//!
//! - [`Validator`]: the capability trait
//! - [`BoundValidator`]: a validator plus its [`OnFail`] policy
//! - [`ValidatorReference`]: declarative record used to (re)build maps
//! - [`ValidatorRegistry`]: resolves reference ids into validators
//! - [`ValidatorMap`]: path → ordered validators
//! - [`JsonPath`]: locators into structured output
//!
//! ## Example
//!
//! ```rust
//! use serdes_guard_validators::{ValidatorMap, ValidatorReference, ValidatorRegistry};
//! use serdes_guard_core::OnFail;
//!
//! let refs = vec![
//!     ValidatorReference::new("valid-length", "output")
//!         .with_arg("max", 5)
//!         .with_on_fail(OnFail::Reask),
//! ];
//! let map = ValidatorMap::from_references(&refs, &ValidatorRegistry::default()).unwrap();
//! assert_eq!(map.validator_count(), 1);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod builtin;
pub mod map;
pub mod metadata;
pub mod path;
pub mod reference;
pub mod registry;
pub mod validator;

pub use builtin::{LowerCase, MatchType, OneLine, RegexMatch, ValidChoices, ValidLength, ValidRange};
pub use map::ValidatorMap;
pub use metadata::verify_metadata_requirements;
pub use path::{JsonPath, Segment};
pub use reference::ValidatorReference;
pub use registry::{ValidatorFactory, ValidatorRegistry};
pub use serdes_guard_core::OnFail;
pub use validator::{BoundValidator, FnValidator, SharedValidator, Validator};
