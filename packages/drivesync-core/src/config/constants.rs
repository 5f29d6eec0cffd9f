// Named constants for the synchronization coordinator
//
// All magic values are centralized here.

/// Maximum number of change records fetched per repository and call
pub const DEFAULT_CHANGE_LIMIT: usize = 1000;

/// Page size used when walking collection members
pub const COLLECTION_CONTENT_PAGE_SIZE: usize = 1000;

/// Page size used when walking the collections of a repository
pub const COLLECTION_LIST_PAGE_SIZE: usize = 1000;

/// Cache sizing (per cache, keyed by user)
pub mod cache {
    /// Maximum number of users held in one cache
    pub const DEFAULT_MAX_CAPACITY: u64 = 10_000;

    /// Entries expire this many seconds after being written
    pub const DEFAULT_TTL_SECS: u64 = 60;
}

/// Document vocabulary shared with the document store
pub mod document {
    /// Marker facet put on every document that ever held a subscription
    pub const DRIVE_SYNCHRONIZED_FACET: &str = "DriveSynchronized";

    /// Facet identifying collection documents
    pub const COLLECTION_FACET: &str = "Collection";

    /// Reserved name of the per-user collection of locally edited documents
    pub const LOCALLY_EDITED_COLLECTION_NAME: &str = "Locally Edited";

    /// Description given to a freshly created "Locally Edited" collection
    pub const LOCALLY_EDITED_COLLECTION_DESCRIPTION: &str =
        "Documents locally edited with the desktop synchronization client";

    /// Lifecycle state excluded from root queries
    pub const DELETED_LIFECYCLE_STATE: &str = "deleted";
}

/// Lifecycle signal category
pub const EVENT_CATEGORY: &str = "driveSync";
