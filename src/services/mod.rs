// Services module

pub mod firestore;
pub mod memory;
pub mod notebooks;
pub mod store;

pub use firestore::FirestoreService;
pub use memory::MemoryStore;
pub use notebooks::NotebookService;
pub use store::{NotebookStore, NotificationSink, StoreError, TemplateStore, UserStore};
