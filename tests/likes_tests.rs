// tests/likes_tests.rs

mod common;

use common::{client, location, spawn_app};

async fn like_rows(pool: &sqlx::SqlitePool, column: &str) -> Vec<(bool, bool)> {
    sqlx::query_as::<_, (bool, bool)>(&format!(
        "SELECT like_dislike, is_active FROM likes WHERE {} IS NOT NULL",
        column
    ))
    .fetch_all(pool)
    .await
    .unwrap()
}

#[tokio::test]
async fn liking_an_article_toggles_a_single_row() {
    // Arrange
    let app = spawn_app().await;
    let author = app.signed_in_user("author_a").await;
    let fan = app.signed_in_user("fan_f").await;
    let topic = app.create_topic(&author, "Poetry").await;
    let topic_id = app.topic_id(&topic).await;
    let article = app.create_article(&author, "Odes", "Verse", topic_id).await;
    let path = format!("/posts/likes/articles/{}", article);

    // Act 1: like
    let response = app.post_form(&fan, &path, &[]).await;

    // Assert
    assert_eq!(response.status().as_u16(), 303);
    assert_eq!(location(&response), format!("/articles/{}", article));
    assert_eq!(like_rows(&app.pool, "article_id").await, vec![(true, true)]);
    let page = app.get(&fan, &format!("/articles/{}", article)).await;
    let body = page.text().await.unwrap();
    assert!(body.contains("You liked the article Odes"));
    assert!(body.contains("1 likes"));
    assert!(body.contains("Unlike"));

    // Act 2: un-like flips the same row
    app.post_form(&fan, &path, &[]).await;
    assert_eq!(like_rows(&app.pool, "article_id").await, vec![(false, true)]);
    let page = app.get(&client(), &format!("/articles/{}", article)).await;
    assert!(page.text().await.unwrap().contains("0 likes"));

    // Act 3: like again
    app.post_form(&fan, &path, &[]).await;
    assert_eq!(like_rows(&app.pool, "article_id").await, vec![(true, true)]);
}

#[tokio::test]
async fn likes_on_topics_and_comments_lead_back_to_public_pages() {
    // Arrange
    let app = spawn_app().await;
    let author = app.signed_in_user("author_a").await;
    let fan = app.signed_in_user("fan_f").await;
    let topic = app.create_topic(&author, "Chess").await;
    let topic_id = app.topic_id(&topic).await;
    let article = app.create_article(&author, "Openings", "e4", topic_id).await;
    let comment = app.create_comment(&author, &article, "Sicilian").await;

    // Act
    let topic_like = app
        .post_form(&fan, &format!("/posts/likes/topics/{}", topic), &[])
        .await;
    let comment_like = app
        .post_form(&fan, &format!("/posts/likes/comments/{}", comment), &[])
        .await;

    // Assert
    assert_eq!(location(&topic_like), format!("/topics/{}", topic));
    assert_eq!(location(&comment_like), format!("/articles/{}", article));
    assert_eq!(like_rows(&app.pool, "topic_id").await.len(), 1);
    assert_eq!(like_rows(&app.pool, "comment_id").await.len(), 1);

    let likes = app.get(&fan, "/posts/likes").await.text().await.unwrap();
    assert!(likes.contains("Chess"));
    assert!(likes.contains("Sicilian"));

    let profile = app.get(&client(), "/authors/fan_f").await.text().await.unwrap();
    assert!(profile.contains("2 likes"));
}

#[tokio::test]
async fn anonymous_like_goes_to_login() {
    // Arrange
    let app = spawn_app().await;
    let author = app.signed_in_user("author_a").await;
    let topic = app.create_topic(&author, "Chess").await;

    // Act
    let response = app
        .post_form(&client(), &format!("/posts/likes/topics/{}", topic), &[])
        .await;

    // Assert
    assert_eq!(response.status().as_u16(), 303);
    assert!(location(&response).starts_with("/accounts/login?next="));
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn liking_a_missing_article_is_404() {
    // Arrange
    let app = spawn_app().await;
    let fan = app.signed_in_user("fan_f").await;

    // Act
    let response = app.post_form(&fan, "/posts/likes/articles/nope", &[]).await;

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn comments_under_a_deleted_article_cannot_be_liked() {
    // Arrange
    let app = spawn_app().await;
    let author = app.signed_in_user("author_a").await;
    let fan = app.signed_in_user("fan_f").await;
    let topic = app.create_topic(&author, "Chess").await;
    let topic_id = app.topic_id(&topic).await;
    let article = app.create_article(&author, "Endgames", "Kings", topic_id).await;
    let comment = app.create_comment(&author, &article, "Opposition").await;
    app.post_form(&author, &format!("/posts/articles/{}/delete", article), &[])
        .await;

    // Act
    let response = app
        .post_form(&fan, &format!("/posts/likes/comments/{}", comment), &[])
        .await;

    // Assert
    assert_eq!(response.status().as_u16(), 404);
    assert!(like_rows(&app.pool, "comment_id").await.is_empty());
}
