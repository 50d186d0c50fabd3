mod common;

use std::collections::HashSet;

use common::{register_teacher, test_app};
use teachshare::services::pages::NewPage;
use teachshare::services::search::SearchQuery;

fn page_with(name: &str, subject_id: i64, grade_id: i64, type_of_work_id: i64) -> NewPage {
    NewPage {
        name: name.to_string(),
        description: None,
        grade_id,
        type_of_work_id,
        subject_id,
    }
}

#[tokio::test]
async fn pagination_over_25_pages() {
    let app = test_app().await;
    let anna = register_teacher(&app, "anna").await;

    for i in 0..25 {
        app.pages
            .create_page(anna.id, page_with(&format!("Lesson {}", i), 1, 1, 1), None)
            .await
            .unwrap();
    }

    let mut seen = HashSet::new();
    for (page_no, expected_len, has_next, has_prev) in
        [(1, 10, true, false), (2, 10, true, true), (3, 5, false, true)]
    {
        let result = app
            .search
            .search_pages(&SearchQuery {
                page: page_no,
                per_page: 10,
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(result.total, 25);
        assert_eq!(result.items.len(), expected_len);
        assert_eq!(result.has_next, has_next, "page {}", page_no);
        assert_eq!(result.has_prev, has_prev, "page {}", page_no);
        for item in &result.items {
            seen.insert(item.page.id);
        }
    }
    assert_eq!(seen.len(), 25);
}

#[tokio::test]
async fn results_are_newest_first() {
    let app = test_app().await;
    let anna = register_teacher(&app, "anna").await;

    let first = app
        .pages
        .create_page(anna.id, page_with("First", 1, 1, 1), None)
        .await
        .unwrap();
    let second = app
        .pages
        .create_page(anna.id, page_with("Second", 1, 1, 1), None)
        .await
        .unwrap();

    let result = app
        .search
        .search_pages(&SearchQuery {
            page: 1,
            per_page: 10,
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(result.items[0].page.id, second.id);
    assert_eq!(result.items[1].page.id, first.id);
}

#[tokio::test]
async fn term_matches_name_description_and_author() {
    let app = test_app().await;
    let anna = register_teacher(&app, "anna").await;
    let boris = register_teacher(&app, "boris").await;

    app.pages
        .create_page(anna.id, page_with("Quadratic equations", 1, 1, 1), None)
        .await
        .unwrap();
    app.pages
        .create_page(
            anna.id,
            NewPage {
                name: "Worksheet".to_string(),
                description: Some("covers QUADRATIC forms".to_string()),
                grade_id: 1,
                type_of_work_id: 1,
                subject_id: 1,
            },
            None,
        )
        .await
        .unwrap();
    app.pages
        .create_page(boris.id, page_with("Unrelated", 1, 1, 1), None)
        .await
        .unwrap();

    // case-insensitive substring over name and description
    let result = app
        .search
        .search_pages(&SearchQuery {
            term: Some("quadratic".to_string()),
            page: 1,
            per_page: 10,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(result.total, 2);

    // author full name matches too ("boris Teacher")
    let result = app
        .search
        .search_pages(&SearchQuery {
            term: Some("BORIS".to_string()),
            page: 1,
            per_page: 10,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(result.total, 1);
    assert_eq!(result.items[0].author_username, "boris");
}

#[tokio::test]
async fn id_filters_restrict_and_empty_lists_do_not() {
    let app = test_app().await;
    let anna = register_teacher(&app, "anna").await;

    app.pages
        .create_page(anna.id, page_with("Math grade 5", 1, 5, 1), None)
        .await
        .unwrap();
    app.pages
        .create_page(anna.id, page_with("Math grade 6", 1, 6, 2), None)
        .await
        .unwrap();
    app.pages
        .create_page(anna.id, page_with("Physics grade 6", 4, 6, 1), None)
        .await
        .unwrap();

    // no filters: everything
    let all = app
        .search
        .search_pages(&SearchQuery {
            page: 1,
            per_page: 10,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(all.total, 3);

    // one dimension restricts
    let math_only = app
        .search
        .search_pages(&SearchQuery {
            subject_ids: vec![1],
            page: 1,
            per_page: 10,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(math_only.total, 2);

    // dimensions combine
    let math_grade6 = app
        .search
        .search_pages(&SearchQuery {
            subject_ids: vec![1],
            grade_ids: vec![6],
            page: 1,
            per_page: 10,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(math_grade6.total, 1);
    assert_eq!(math_grade6.items[0].page.name, "Math grade 6");

    // a list with several ids means membership
    let either_grade = app
        .search
        .search_pages(&SearchQuery {
            grade_ids: vec![5, 6],
            page: 1,
            per_page: 10,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(either_grade.total, 3);

    let worktype = app
        .search
        .search_pages(&SearchQuery {
            work_type_ids: vec![2],
            page: 1,
            per_page: 10,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(worktype.total, 1);
}

#[tokio::test]
async fn no_matches_is_an_empty_first_page() {
    let app = test_app().await;
    let anna = register_teacher(&app, "anna").await;
    app.pages
        .create_page(anna.id, page_with("Lesson", 1, 1, 1), None)
        .await
        .unwrap();

    let result = app
        .search
        .search_pages(&SearchQuery {
            term: Some("nothing like this".to_string()),
            page: 1,
            per_page: 10,
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(result.total, 0);
    assert!(result.items.is_empty());
    assert!(!result.has_next);
    assert!(!result.has_prev);
}
