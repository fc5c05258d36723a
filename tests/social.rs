mod common;
use common::TestServer;
use reqwest::StatusCode;
use serde_json::json;

async fn public_template(server: &TestServer) -> anyhow::Result<i64> {
    server
        .login("author")
        .await?
        .create_template(json!({
            "title": "Book club",
            "is_public": true,
            "questions": [{ "text": "Favourite book", "question_type": "single_line_text" }]
        }))
        .await
}

#[tokio::test]
async fn likes_toggle_and_count() -> anyhow::Result<()> {
    let server = TestServer::spawn().await?;
    let id = public_template(&server).await?;
    let reader = server.login("reader").await?;
    let path = format!("/api/templates/{}/likes", id);

    let (status, state) = reader.post(&path, json!({})).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state, json!({ "liked": true, "count": 1 }));

    let (_, anon_state) = server.anonymous().get(&path).await?;
    assert_eq!(anon_state, json!({ "liked": false, "count": 1 }));

    let (status, _) = server.anonymous().post(&path, json!({})).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, popular) = reader.get("/api/templates/popular").await?;
    assert_eq!(popular[0]["like_count"], 1);

    let (_, state) = reader.post(&path, json!({})).await?;
    assert_eq!(state, json!({ "liked": false, "count": 0 }));
    Ok(())
}

#[tokio::test]
async fn comments_post_and_delete() -> anyhow::Result<()> {
    let server = TestServer::spawn().await?;
    let id = public_template(&server).await?;
    let author = server.login("author").await?;
    let reader = server.login("reader").await?;
    let stranger = server.login("stranger").await?;
    let path = format!("/api/templates/{}/comments", id);

    let (status, body) = reader.post(&path, json!({ "text": "x".repeat(51) })).await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invalid_input");
    let (status, _) = reader.post(&path, json!({ "text": "   " })).await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, first) = reader.post(&path, json!({ "text": "  Loved it  " })).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["content"], "Loved it");
    assert_eq!(first["author_name"], "reader Tester");
    let (_, second) = reader.post(&path, json!({ "text": "Again" })).await?;

    let (_, listed) = server.anonymous().get(&path).await?;
    assert_eq!(listed.as_array().map(Vec::len), Some(2));
    assert_eq!(listed[0]["content"], "Again");

    let first_path = format!("/api/comments/{}", first["id"]);
    assert_eq!(stranger.delete(&first_path).await?.0, StatusCode::FORBIDDEN);
    // Template owners moderate their comment threads.
    assert_eq!(author.delete(&first_path).await?.0, StatusCode::NO_CONTENT);
    assert_eq!(author.delete(&first_path).await?.0, StatusCode::NOT_FOUND);
    assert_eq!(
        reader.delete(&format!("/api/comments/{}", second["id"])).await?.0,
        StatusCode::NO_CONTENT
    );

    let (_, listed) = reader.get(&path).await?;
    assert_eq!(listed, json!([]));
    Ok(())
}

#[tokio::test]
async fn private_template_hides_social_data() -> anyhow::Result<()> {
    let server = TestServer::spawn().await?;
    let author = server.login("author").await?;
    let reader = server.login("reader").await?;
    let id = author
        .create_template(json!({ "title": "Diary", "is_public": false, "questions": [] }))
        .await?;

    let (status, _) = reader.get(&format!("/api/templates/{}/comments", id)).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = reader.post(&format!("/api/templates/{}/likes", id), json!({})).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = author.post(&format!("/api/templates/{}/likes", id), json!({})).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}
