//! Local UI stores.
//!
//! Small, independent state containers that never touch the network. Each
//! store owns its state, exposes its transitions as methods and, when it
//! implements [`Persisted`], writes a snapshot to [`LocalStorage`] after every
//! committed change.

mod container;
mod counter;
mod modal;
mod persist;
mod selection;
mod session;
mod todo;

pub use container::{Selection, Store};
pub use counter::CounterStore;
pub use modal::{ModalState, ModalStore};
pub use persist::{LocalStorage, MemoryStorage, Persisted, StorageError};
pub use selection::{QuerySelection, SelectionStore};
pub use session::{SessionStore, UserSelection};
pub use todo::{TodoSnapshot, TodoState, TodoStore};
