// Domain operations. Every service takes explicit identity parameters;
// there is no ambient current-user state anywhere in this layer.

pub mod accounts;
pub mod follows;
pub mod notifications;
pub mod pages;
pub mod profiles;
pub mod reference;
pub mod reviews;
pub mod search;

pub use accounts::AccountService;
pub use follows::FollowService;
pub use notifications::NotificationService;
pub use pages::PageService;
pub use profiles::ProfileService;
pub use reference::ReferenceService;
pub use reviews::ReviewService;
pub use search::SearchService;
