use std::sync::Arc;

use tempfile::TempDir;

use teachshare::config::Config;
use teachshare::data_seeder::seed_reference_data;
use teachshare::database::Database;
use teachshare::models::Teacher;
use teachshare::services::accounts::NewTeacher;
use teachshare::services::pages::NewPage;
use teachshare::services::{
    AccountService, FollowService, NotificationService, PageService, ProfileService,
    ReferenceService, ReviewService, SearchService,
};
use teachshare::storage::FileStore;

pub struct TestApp {
    pub accounts: AccountService,
    pub profiles: ProfileService,
    pub follows: FollowService,
    pub pages: PageService,
    pub reviews: ReviewService,
    pub search: SearchService,
    pub notifications: NotificationService,
    pub reference: ReferenceService,
    pub store: Arc<FileStore>,
    // keeps the database file and upload dirs alive for the test's duration
    _tmp: TempDir,
}

pub async fn test_app() -> TestApp {
    let tmp = TempDir::new().unwrap();

    let mut config = Config::from_env().unwrap();
    config.uploads.dir = tmp.path().join("uploads");
    config.avatars.dir = tmp.path().join("uploads").join("avatars");

    let db_path = tmp.path().join("test.db");
    let db = Database::new(&format!("sqlite:{}", db_path.display()))
        .await
        .unwrap();
    db.init().await.unwrap();
    seed_reference_data(&db).await.unwrap();
    let db = Arc::new(db);

    let store = Arc::new(FileStore::new(&config));
    store.ensure_dirs().unwrap();

    let follows = FollowService::new(db.clone());
    let notifications = NotificationService::new(db.clone());

    TestApp {
        accounts: AccountService::new(
            db.clone(),
            "test-secret".to_string(),
            600,
            30 * 24 * 3600,
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
        store,
        _tmp: tmp,
    }
}

pub async fn register_teacher(app: &TestApp, username: &str) -> Teacher {
    app.accounts
        .register(NewTeacher {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            password: "password123".to_string(),
            full_name: format!("{} Teacher", username),
            about: None,
            institution_id: None,
            subject_ids: vec![1],
        })
        .await
        .unwrap()
}

pub fn simple_page(name: &str) -> NewPage {
    NewPage {
        name: name.to_string(),
        description: None,
        grade_id: 1,
        type_of_work_id: 1,
        subject_id: 1,
    }
}
