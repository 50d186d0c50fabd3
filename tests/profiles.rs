mod common;

use common::{register_teacher, test_app};
use teachshare::services::profiles::ProfileUpdate;
use teachshare::AppError;

fn update(username: &str, subject_ids: Vec<i64>) -> ProfileUpdate {
    ProfileUpdate {
        username: username.to_string(),
        full_name: "Anna Teacher".to_string(),
        about: Some("I teach".to_string()),
        institution_id: None,
        subject_ids,
    }
}

#[tokio::test]
async fn edit_profile_updates_fields_and_subjects() {
    let app = test_app().await;
    let anna = register_teacher(&app, "anna").await;

    let updated = app
        .profiles
        .edit_profile(anna.id, update("anna", vec![2, 3]))
        .await
        .unwrap();

    assert_eq!(updated.about.as_deref(), Some("I teach"));
    let subjects = app.profiles.subjects_of(anna.id).await.unwrap();
    let ids: Vec<i64> = subjects.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![2, 3]);
}

#[tokio::test]
async fn username_change_to_taken_name_is_rejected() {
    let app = test_app().await;
    let anna = register_teacher(&app, "anna").await;
    register_teacher(&app, "boris").await;

    let err = app
        .profiles
        .edit_profile(anna.id, update("boris", vec![1]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    // keeping your own username is always allowed
    app.profiles
        .edit_profile(anna.id, update("anna", vec![1]))
        .await
        .unwrap();
}

#[tokio::test]
async fn username_change_keeps_the_avatar() {
    let app = test_app().await;
    let anna = register_teacher(&app, "anna").await;

    let img = image::DynamicImage::new_rgb8(200, 300);
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    app.profiles
        .store_avatar("anna", "me.png", &buf.into_inner())
        .unwrap();

    let renamed = app
        .profiles
        .edit_profile(anna.id, update("anya", vec![1]))
        .await
        .unwrap();

    assert_eq!(app.profiles.avatar_url(&renamed), "/avatars/anya.png");
}

#[tokio::test]
async fn reference_lists_cascade() {
    let app = test_app().await;

    let regions = app.reference.regions().await.unwrap();
    assert!(!regions.is_empty());

    let settlements = app
        .reference
        .settlements_by_region(regions[0].id)
        .await
        .unwrap();
    assert!(!settlements.is_empty());

    let institutions = app
        .reference
        .institutions_by_settlement(settlements[0].id)
        .await
        .unwrap();
    assert!(!institutions.is_empty());

    // unknown parents produce empty lists, not errors
    assert!(app
        .reference
        .settlements_by_region(9999)
        .await
        .unwrap()
        .is_empty());
}
