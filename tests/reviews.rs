mod common;

use common::{register_teacher, simple_page, test_app};
use teachshare::AppError;

#[tokio::test]
async fn average_rating_tracks_review_set() {
    let app = test_app().await;
    let anna = register_teacher(&app, "anna").await;
    let boris = register_teacher(&app, "boris").await;
    let carol = register_teacher(&app, "carol").await;

    let page = app
        .pages
        .create_page(anna.id, simple_page("Fractions"), None)
        .await
        .unwrap();
    assert_eq!(app.pages.get_page(page.id).await.unwrap().average_rating, 0.0);

    let review_b = app
        .reviews
        .add_review(page.id, boris.id, 4, "solid".to_string())
        .await
        .unwrap();
    assert_eq!(app.pages.get_page(page.id).await.unwrap().average_rating, 4.0);

    let review_c = app
        .reviews
        .add_review(page.id, carol.id, 5, "excellent".to_string())
        .await
        .unwrap();
    assert_eq!(app.pages.get_page(page.id).await.unwrap().average_rating, 4.5);

    app.reviews
        .delete_review(review_b.id, boris.id)
        .await
        .unwrap();
    assert_eq!(app.pages.get_page(page.id).await.unwrap().average_rating, 5.0);

    app.reviews
        .delete_review(review_c.id, carol.id)
        .await
        .unwrap();
    assert_eq!(app.pages.get_page(page.id).await.unwrap().average_rating, 0.0);
}

#[tokio::test]
async fn rate_must_be_one_to_five() {
    let app = test_app().await;
    let anna = register_teacher(&app, "anna").await;
    let boris = register_teacher(&app, "boris").await;

    let page = app
        .pages
        .create_page(anna.id, simple_page("Fractions"), None)
        .await
        .unwrap();

    for bad_rate in [0, 6, -1] {
        let err = app
            .reviews
            .add_review(page.id, boris.id, bad_rate, "".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}

#[tokio::test]
async fn authors_cannot_review_their_own_pages() {
    let app = test_app().await;
    let anna = register_teacher(&app, "anna").await;

    let page = app
        .pages
        .create_page(anna.id, simple_page("Fractions"), None)
        .await
        .unwrap();

    let err = app
        .reviews
        .add_review(page.id, anna.id, 5, "self praise".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn one_review_per_author_per_page() {
    let app = test_app().await;
    let anna = register_teacher(&app, "anna").await;
    let boris = register_teacher(&app, "boris").await;

    let page = app
        .pages
        .create_page(anna.id, simple_page("Fractions"), None)
        .await
        .unwrap();

    app.reviews
        .add_review(page.id, boris.id, 3, "first".to_string())
        .await
        .unwrap();
    let err = app
        .reviews
        .add_review(page.id, boris.id, 5, "second".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    // the first review and the average are unchanged
    let reviews = app.reviews.reviews_for_page(page.id).await.unwrap();
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0].review.rate, 3);
    assert_eq!(app.pages.get_page(page.id).await.unwrap().average_rating, 3.0);
}

#[tokio::test]
async fn only_the_author_may_delete_a_review() {
    let app = test_app().await;
    let anna = register_teacher(&app, "anna").await;
    let boris = register_teacher(&app, "boris").await;
    let carol = register_teacher(&app, "carol").await;

    let page = app
        .pages
        .create_page(anna.id, simple_page("Fractions"), None)
        .await
        .unwrap();
    let review = app
        .reviews
        .add_review(page.id, boris.id, 4, "fine".to_string())
        .await
        .unwrap();

    let err = app
        .reviews
        .delete_review(review.id, carol.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    app.reviews.delete_review(review.id, boris.id).await.unwrap();
    assert!(app
        .reviews
        .reviews_for_page(page.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn reviews_carry_author_names() {
    let app = test_app().await;
    let anna = register_teacher(&app, "anna").await;
    let boris = register_teacher(&app, "boris").await;

    let page = app
        .pages
        .create_page(anna.id, simple_page("Fractions"), None)
        .await
        .unwrap();
    app.reviews
        .add_review(page.id, boris.id, 4, "fine".to_string())
        .await
        .unwrap();

    let reviews = app.reviews.reviews_for_page(page.id).await.unwrap();
    assert_eq!(reviews[0].author_username, "boris");
    assert_eq!(reviews[0].author_full_name, "boris Teacher");
}
