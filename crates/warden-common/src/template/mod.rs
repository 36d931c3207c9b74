//! Templating for workload environment variables and files
//!
//! Templates use Jinja syntax evaluated by minijinja against the relation
//! data visible to the controller:
//!
//! - `{{ relations.consumed.NAME.app.FIELD }}` - application data
//! - `{{ relations.consumed.NAME.units[0].FIELD }}` - unit data
//! - `{% for unit in relations.consumed.NAME.units %}...{% endfor %}` - loops
//! - Filters: `default`, `required`, `base64_encode`, `base64_decode`, `upper`, `lower`

mod context;
mod engine;
mod error;
mod filters;

pub use context::{
    RelationData, RelationDataBuilder, RelationsContext, TemplateGlobals, TemplateGlobalsBuilder,
};
pub use engine::TemplateEngine;
pub use error::TemplateError;
