use std::sync::Arc;

use crate::{
    config::Config,
    database::Database,
    services::{
        AccountService, FollowService, NotificationService, PageService, ProfileService,
        ReferenceService, ReviewService, SearchService,
    },
    storage::FileStore,
};

#[derive(Clone)]
pub struct AppState {
    pub accounts: AccountService,
    pub profiles: ProfileService,
    pub follows: FollowService,
    pub pages: PageService,
    pub reviews: ReviewService,
    pub search: SearchService,
    pub notifications: NotificationService,
    pub reference: ReferenceService,
    pub config: Config,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        // Initialize database
        let database = Database::new(&config.database.url).await?;
        database.init().await?;
        let db = Arc::new(database);

        let store = Arc::new(FileStore::new(&config));
        store.ensure_dirs()?;

        let follows = FollowService::new(db.clone());
        let notifications = NotificationService::new(db.clone());

        Ok(Self {
            accounts: AccountService::new(
                db.clone(),
                config.security.secret_key.clone(),
                config.security.reset_token_ttl,
                config.security.session_ttl,
            ),
            profiles: ProfileService::new(db.clone(), store.clone()),
            pages: PageService::new(
                db.clone(),
                store.clone(),
                follows.clone(),
                notifications.clone(),
            ),
            reviews: ReviewService::new(db.clone()),
            search: SearchService::new(db.clone()),
            reference: ReferenceService::new(db),
            follows,
            notifications,
            config,
        })
    }
}
