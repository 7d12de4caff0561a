//! Hierarchical content tree editor for course catalogues.
//!
//! A tree holds Boards → Grades → Subjects → Chapters → Sessions. Every edit
//! goes through [`TreeEditor`], which resolves a path of ids, rebuilds only
//! the nodes on that path and re-derives their [`Aggregates`]. Untouched
//! subtrees are shared between the old and the new [`TreeHandle`].

pub mod aggregate;
pub mod clock;
pub mod editor;
pub mod error;
pub mod ident;
pub mod model;
pub mod selection;
pub mod settings;
pub mod snapshot;
pub mod tree;
pub mod validate;

pub use aggregate::Aggregates;
pub use clock::{Clock, FixedClock, SystemClock};
pub use editor::{DuplicateOptions, Inserted, Removed, TitleMode, TreeEditor, Updated};
pub use error::{EditError, FieldError, ValidationErrors, ValidationWarning};
pub use ident::{IdGenerator, IdStrategy};
pub use model::{Attributes, Level, Node, NodeId, SessionStatus};
pub use selection::SelectionState;
pub use settings::Settings;
pub use snapshot::{export_node, export_tree, load_tree, NodeRecord, TreeRecord};
pub use tree::TreeHandle;
