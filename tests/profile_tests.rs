// tests/profile_tests.rs

mod common;

use common::{PASSWORD, client, location, spawn_app};
use reqwest::multipart::{Form, Part};

async fn photo_of(pool: &sqlx::SqlitePool, username: &str) -> String {
    sqlx::query_scalar("SELECT photo FROM users WHERE username = ?")
        .bind(username)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn upload_photo(
    app: &common::TestApp,
    client: &reqwest::Client,
    file_name: &'static str,
) -> reqwest::Response {
    let form = Form::new().part(
        "photo",
        Part::bytes(b"not really an image".to_vec()).file_name(file_name),
    );
    client
        .post(app.url("/accounts/profile/photo"))
        .multipart(form)
        .send()
        .await
        .expect("Failed to execute request")
}

#[tokio::test]
async fn profile_form_shows_current_values() {
    // Arrange
    let app = spawn_app().await;
    let client = app.signed_in_user("kate_k").await;

    // Act
    let response = app.get(&client, "/accounts/profile").await;

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains("kate_k Writer"));
    assert!(body.contains("kate_k@example.com"));
}

#[tokio::test]
async fn profile_update_saves_fields() {
    // Arrange
    let app = spawn_app().await;
    let client = app.signed_in_user("kate_k").await;

    // Act
    let response = app
        .post_form(
            &client,
            "/accounts/profile",
            &[
                ("name", "Kate Keller"),
                ("email", "kate@keller.example.com"),
                ("phone", ""),
                ("about_me", "Writes about tea"),
                ("web", "https://keller.example.com"),
                ("instagram", ""),
                ("twitter", ""),
            ],
        )
        .await;

    // Assert
    assert_eq!(response.status().as_u16(), 303);
    assert_eq!(location(&response), "/accounts/profile");

    let row = sqlx::query_as::<_, (String, String, Option<String>, Option<String>, Option<String>)>(
        "SELECT name, email, about_me, web, phone FROM users WHERE username = 'kate_k'",
    )
    .fetch_one(&app.pool)
    .await
    .unwrap();
    assert_eq!(row.0, "Kate Keller");
    assert_eq!(row.1, "kate@keller.example.com");
    assert_eq!(row.2.as_deref(), Some("Writes about tea"));
    assert_eq!(row.3.as_deref(), Some("https://keller.example.com"));
    assert_eq!(row.4, None, "blank optional fields are stored as NULL");

    let page = app.get(&client, "/accounts/profile").await;
    assert!(page.text().await.unwrap().contains("Your profile has been updated"));
}

#[tokio::test]
async fn profile_update_rejects_bad_url_and_taken_email() {
    // Arrange
    let app = spawn_app().await;
    app.signed_in_user("first_f").await;
    let client = app.signed_in_user("kate_k").await;

    // Act
    let bad_url = app
        .post_form(
            &client,
            "/accounts/profile",
            &[("name", "Kate"), ("email", "kate_k@example.com"), ("web", "not a url")],
        )
        .await;
    let taken = app
        .post_form(
            &client,
            "/accounts/profile",
            &[("name", "Kate"), ("email", "first_f@example.com")],
        )
        .await;

    // Assert
    assert_eq!(bad_url.status().as_u16(), 400);
    assert!(bad_url.text().await.unwrap().contains("Enter a valid URL"));
    assert_eq!(taken.status().as_u16(), 400);
    assert!(taken.text().await.unwrap().contains("A user with that email already exists"));

    let name: String = sqlx::query_scalar("SELECT name FROM users WHERE username = 'kate_k'")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(name, "kate_k Writer");
}

#[tokio::test]
async fn email_taken_during_update_is_a_form_error() {
    // Arrange: the address is registered between the check and the write
    let app = spawn_app().await;
    let client = app.signed_in_user("kate_k").await;
    sqlx::query(
        "CREATE TRIGGER claim_email BEFORE UPDATE OF email ON users \
         WHEN NEW.email = 'late@example.com' BEGIN \
         INSERT INTO users (username, email, name, password, created_at, updated_at) \
         VALUES ('late_l', 'late@example.com', 'Late', 'x', 'now', 'now'); \
         END",
    )
    .execute(&app.pool)
    .await
    .unwrap();

    // Act
    let response = app
        .post_form(
            &client,
            "/accounts/profile",
            &[("name", "Kate"), ("email", "late@example.com")],
        )
        .await;

    // Assert
    assert_eq!(response.status().as_u16(), 400);
    assert!(response.text().await.unwrap().contains("A user with that email already exists"));
    let email: String = sqlx::query_scalar("SELECT email FROM users WHERE username = 'kate_k'")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(email, "kate_k@example.com");
}

#[tokio::test]
async fn photo_upload_replaces_the_default_image() {
    // Arrange
    let app = spawn_app().await;
    let client = app.signed_in_user("kate_k").await;
    assert_eq!(photo_of(&app.pool, "kate_k").await, "images/default.png");

    // Act
    let response = upload_photo(&app, &client, "me.JPG").await;

    // Assert
    assert_eq!(response.status().as_u16(), 303);
    let photo = photo_of(&app.pool, "kate_k").await;
    assert!(photo.starts_with("images/bloggers/"));
    assert!(photo.ends_with(".jpg"));

    let served = app.get(&client, &format!("/media/{}", photo)).await;
    assert_eq!(served.status().as_u16(), 200);
    assert_eq!(served.bytes().await.unwrap().as_ref(), b"not really an image");
}

#[tokio::test]
async fn photo_with_wrong_extension_is_refused() {
    // Arrange
    let app = spawn_app().await;
    let client = app.signed_in_user("kate_k").await;

    // Act
    let response = upload_photo(&app, &client, "notes.txt").await;

    // Assert
    assert_eq!(response.status().as_u16(), 303);
    assert_eq!(photo_of(&app.pool, "kate_k").await, "images/default.png");
    let page = app.get(&client, "/accounts/profile").await;
    assert!(page.text().await.unwrap().contains("Upload a valid image"));
}

#[tokio::test]
async fn deleting_the_account_hides_the_author() {
    // Arrange
    let app = spawn_app().await;
    let client = app.signed_in_user("leo_l").await;
    app.signed_in_user("mia_m").await;

    // Act
    let response = app.post_form(&client, "/accounts/profile/delete", &[]).await;

    // Assert
    assert_eq!(response.status().as_u16(), 303);
    assert_eq!(location(&response), "/accounts/profile/deleted");

    let (is_active, deleted_at) = sqlx::query_as::<_, (bool, Option<String>)>(
        "SELECT is_active, deleted_at FROM users WHERE username = 'leo_l'",
    )
    .fetch_one(&app.pool)
    .await
    .unwrap();
    assert!(!is_active);
    assert!(deleted_at.is_some());

    let goodbye = app.get(&client, "/accounts/profile/deleted").await;
    assert_eq!(goodbye.status().as_u16(), 200);

    // The session is gone.
    let dashboard = app.get(&client, "/accounts/dashboard").await;
    assert_eq!(dashboard.status().as_u16(), 303);

    let authors = app.get(&common::client(), "/authors").await.text().await.unwrap();
    assert!(!authors.contains("leo_l"));
    assert!(authors.contains("mia_m"));

    let profile = app.get(&common::client(), "/authors/leo_l").await;
    assert_eq!(profile.status().as_u16(), 404);

    let login = app.login(&common::client(), "leo_l", PASSWORD).await;
    assert_eq!(login.status().as_u16(), 400);
}

#[tokio::test]
async fn dashboard_lists_own_work() {
    // Arrange
    let app = spawn_app().await;
    let writer = app.signed_in_user("nora_n").await;
    let topic = app.create_topic(&writer, "Gardening").await;
    let topic_id = app.topic_id(&topic).await;
    let article = app.create_article(&writer, "Tomatoes", "<p>Sun</p>", topic_id).await;
    app.create_comment(&writer, &article, "Water daily").await;

    // Act
    let response = app.get(&writer, "/accounts/dashboard").await;

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains("Welcome, nora_n Writer"));
    assert!(body.contains("Tomatoes"));
    assert!(body.contains("Water daily"));

    let anonymous = app.get(&client(), "/accounts/dashboard").await;
    assert_eq!(anonymous.status().as_u16(), 303);
}
