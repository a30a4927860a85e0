pub mod defaults;
pub mod model;
pub mod store;
pub mod validator;

pub use model::{Category, JobKind, RuleSet, Template, TemplateSummary};
pub use store::TemplateStore;
pub use validator::{validate, ValidationReport};
