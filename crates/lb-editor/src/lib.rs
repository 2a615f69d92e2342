pub mod config;
pub mod editor;
pub mod engine;
pub mod frame;
pub mod input;
pub mod interaction;
pub mod shortcuts;

pub use config::{ConfigError, EditorConfig};
pub use editor::{Editor, LabelEdit, Notice, PendingConnection, Selection};
pub use engine::{Applied, Mutation, SceneEngine};
pub use frame::{DirtySet, FrameScheduler};
pub use input::{InputEvent, Modifiers, PointerButton, PointerId};
pub use interaction::{Interaction, InteractionKind};
pub use shortcuts::{ShortcutAction, ShortcutMap};
