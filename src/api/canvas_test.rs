#[cfg(test)]
mod tests {
    use crate::api::{CanvasClient, LmsApi};
    use crate::config::Config;
    use crate::error::{AppError, Result};
    use crate::models::{Folder, GradeBatch, GradeEntry, JobState};
    use mockito::{Matcher, Server, ServerGuard};
    use serde_json::json;
    use std::io::Write;
    use tempfile::TempDir;

    const TOKEN: &str = "test-token";

    fn client_for(server: &ServerGuard) -> CanvasClient {
        CanvasClient::new(&Config::new(server.url(), TOKEN)).unwrap()
    }

    fn folder(id: u64, name: &str) -> serde_json::Value {
        json!({"id": id, "name": name, "full_name": format!("course files/{}", name)})
    }

    #[tokio::test]
    async fn test_list_courses_is_cached_until_refresh() -> Result<()> {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/api/v1/courses")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("enrollment_state".into(), "active".into()),
                Matcher::UrlEncoded("per_page".into(), "100".into()),
            ]))
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!([{"id": 1, "name": "Compilers", "course_code": "CS-401"}]).to_string())
            .expect(2)
            .create_async()
            .await;

        let client = client_for(&server);
        let first = client.list_courses(false).await?;
        let second = client.list_courses(false).await?;
        let refreshed = client.list_courses(true).await?;

        assert_eq!(first.len(), 1);
        assert_eq!(first, second);
        assert_eq!(refreshed[0].course_code.as_deref(), Some("CS-401"));
        m.assert_async().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_course_cache_is_refetched() -> Result<()> {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/api/v1/courses")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("[]")
            .expect(2)
            .create_async()
            .await;

        let client = client_for(&server);
        assert!(client.list_courses(false).await?.is_empty());
        assert!(client.list_courses(false).await?.is_empty());
        m.assert_async().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_list_students_follows_pagination() -> Result<()> {
        let mut server = Server::new_async().await;
        let next = format!("{}/api/v1/courses/7/users?page=2&per_page=100", server.url());

        let page1 = server
            .mock("GET", "/api/v1/courses/7/users")
            .match_query(Matcher::UrlEncoded("enrollment_type[]".into(), "student".into()))
            .with_status(200)
            .with_header("link", &format!("<{}>; rel=\"next\"", next))
            .with_body(json!([{"id": 101, "name": "Ada"}]).to_string())
            .create_async()
            .await;
        let page2 = server
            .mock("GET", "/api/v1/courses/7/users")
            .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .with_body(json!([{"id": 102, "name": "Grace", "email": "g@example.edu"}]).to_string())
            .create_async()
            .await;

        let students = client_for(&server).list_students(7).await?;

        assert_eq!(students.len(), 2);
        assert_eq!(students[1].email.as_deref(), Some("g@example.edu"));
        page1.assert_async().await;
        page2.assert_async().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_non_success_status_becomes_remote_api_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/api/v1/courses/3/assignments")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body("{\"errors\":[{\"message\":\"Invalid access token.\"}]}")
            .create_async()
            .await;

        let err = client_for(&server).list_assignments(3).await.unwrap_err();

        match err {
            AppError::RemoteApi { status, body } => {
                assert_eq!(status, 401);
                assert!(body.contains("Invalid access token"));
            },
            other => panic!("Expected RemoteApi, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_host_becomes_transport_error() {
        let client = CanvasClient::new(&Config::new("http://127.0.0.1:9", TOKEN)).unwrap();
        let err = client.list_courses(true).await.unwrap_err();
        assert!(matches!(err, AppError::Transport(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_ensure_folder_uses_lookup_by_path() -> Result<()> {
        let mut server = Server::new_async().await;
        let by_path = server
            .mock("GET", "/api/v1/courses/5/folders/by_path/Grade_Feedback/Week_1")
            .with_status(200)
            .with_body(
                json!([folder(1, "course files"), folder(2, "Grade_Feedback"), folder(3, "Week_1")])
                    .to_string(),
            )
            .create_async()
            .await;
        let root = server
            .mock("GET", "/api/v1/courses/5/folders/root")
            .expect(0)
            .create_async()
            .await;

        let found = client_for(&server)
            .ensure_folder(5, "/Grade_Feedback/Week_1/")
            .await?;

        assert_eq!(found.id, 3);
        by_path.assert_async().await;
        root.assert_async().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_ensure_folder_creates_missing_segments() -> Result<()> {
        let mut server = Server::new_async().await;
        let _by_path = server
            .mock("GET", "/api/v1/courses/5/folders/by_path/Grade_Feedback/Week_1")
            .with_status(404)
            .with_body("{\"errors\":[{\"message\":\"not found\"}]}")
            .create_async()
            .await;
        let _root = server
            .mock("GET", "/api/v1/courses/5/folders/root")
            .with_status(200)
            .with_body(folder(1, "course files").to_string())
            .create_async()
            .await;
        let _root_children = server
            .mock("GET", "/api/v1/folders/1/folders")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!([folder(2, "Grade_Feedback"), folder(9, "Slides")]).to_string())
            .create_async()
            .await;
        let _feedback_children = server
            .mock("GET", "/api/v1/folders/2/folders")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;
        let reuse_parent = server
            .mock("POST", "/api/v1/folders/1/folders")
            .expect(0)
            .create_async()
            .await;
        let create = server
            .mock("POST", "/api/v1/folders/2/folders")
            .match_body(Matcher::Json(json!({"name": "Week_1"})))
            .with_status(200)
            .with_body(folder(10, "Week_1").to_string())
            .expect(1)
            .create_async()
            .await;

        let created = client_for(&server)
            .ensure_folder(5, "Grade_Feedback/Week_1")
            .await?;

        assert_eq!(created.id, 10);
        reuse_parent.assert_async().await;
        create.assert_async().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_ensure_folder_twice_reuses_existing_folder() -> Result<()> {
        let mut server = Server::new_async().await;
        let _by_path = server
            .mock("GET", "/api/v1/courses/5/folders/by_path/Grade_Feedback")
            .with_status(404)
            .expect(2)
            .create_async()
            .await;
        let _root = server
            .mock("GET", "/api/v1/courses/5/folders/root")
            .with_status(200)
            .with_body(folder(1, "course files").to_string())
            .expect(2)
            .create_async()
            .await;
        let _children = server
            .mock("GET", "/api/v1/folders/1/folders")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!([folder(2, "Grade_Feedback")]).to_string())
            .expect(2)
            .create_async()
            .await;
        let create = server
            .mock("POST", "/api/v1/folders/1/folders")
            .expect(0)
            .create_async()
            .await;

        let client = client_for(&server);
        let first = client.ensure_folder(5, "Grade_Feedback").await?;
        let second = client.ensure_folder(5, "Grade_Feedback").await?;

        assert_eq!(first, second);
        assert_eq!(first.id, 2);
        create.assert_async().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_ensure_folder_propagates_non_404_lookup_errors() {
        let mut server = Server::new_async().await;
        let _by_path = server
            .mock("GET", "/api/v1/courses/5/folders/by_path/Grade_Feedback")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let err = client_for(&server)
            .ensure_folder(5, "Grade_Feedback")
            .await
            .unwrap_err();
        assert!(err.is_status(500));
    }

    #[tokio::test]
    async fn test_upload_file_runs_both_phases() -> Result<()> {
        let mut server = Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let pdf = dir.path().join("feedback_101.pdf");
        std::fs::File::create(&pdf)
            .unwrap()
            .write_all(b"%PDF-1.4 test")
            .unwrap();

        let negotiate = server
            .mock("POST", "/api/v1/courses/5/files")
            .match_header("authorization", "Bearer test-token")
            .match_body(Matcher::PartialJson(json!({
                "name": "feedback_101.pdf",
                "size": 13,
                "content_type": "application/pdf",
                "parent_folder_id": 10
            })))
            .with_status(200)
            .with_body(
                json!({
                    "upload_url": format!("{}/files_api/upload", server.url()),
                    "upload_params": {"key": "abc/feedback_101.pdf", "success_action_status": 201}
                })
                .to_string(),
            )
            .create_async()
            .await;
        let transfer = server
            .mock("POST", "/files_api/upload")
            .match_header("authorization", Matcher::Missing)
            .match_body(Matcher::Regex("abc/feedback_101.pdf".into()))
            .with_status(201)
            .with_body(
                json!({"id": 555, "display_name": "feedback_101.pdf", "url": "https://files.example/555"})
                    .to_string(),
            )
            .create_async()
            .await;

        let target = Folder {
            id: 10,
            name: "Week_1".into(),
            full_name: Some("course files/Grade_Feedback/Week_1".into()),
            parent_folder_id: Some(2),
        };
        let uploaded = client_for(&server).upload_file(5, &target, &pdf).await?;

        assert_eq!(uploaded.remote_id, 555);
        assert_eq!(uploaded.display_name, "feedback_101.pdf");
        assert_eq!(uploaded.view_url, format!("{}/courses/5/files/555", server.url()));
        assert_eq!(
            uploaded.download_url,
            format!("{}/courses/5/files/555/download", server.url())
        );
        assert_eq!(uploaded.public_url, "https://files.example/555");
        assert_eq!(uploaded.remote_folder_path, "course files/Grade_Feedback/Week_1");
        negotiate.assert_async().await;
        transfer.assert_async().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_upload_file_enforces_limits_before_any_request() {
        let mut server = Server::new_async().await;
        let negotiate = server
            .mock("POST", "/api/v1/courses/5/files")
            .expect(0)
            .create_async()
            .await;
        let dir = TempDir::new().unwrap();
        let exe = dir.path().join("payload.exe");
        std::fs::write(&exe, b"MZ").unwrap();
        let big = dir.path().join("big.pdf");
        std::fs::write(&big, vec![0u8; 2 * 1024 * 1024]).unwrap();

        let mut config = Config::new(server.url(), TOKEN);
        config.upload.max_file_size_mb = 1;
        let client = CanvasClient::new(&config).unwrap();
        let target = Folder {
            id: 10,
            name: "Week_1".into(),
            full_name: None,
            parent_folder_id: None,
        };

        let err = client.upload_file(5, &target, &exe).await.unwrap_err();
        assert!(matches!(err, AppError::FileTypeNotAllowed { ref extension, .. } if extension == ".exe"));

        let err = client.upload_file(5, &target, &big).await.unwrap_err();
        assert!(matches!(err, AppError::FileTooLarge { size, .. } if size == 2 * 1024 * 1024));

        let err = client
            .upload_file(5, &target, &dir.path().join("missing.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::FileNotFound(_)));

        negotiate.assert_async().await;
    }

    #[tokio::test]
    async fn test_submit_grades_and_poll_progress() -> Result<()> {
        let mut server = Server::new_async().await;
        let submit = server
            .mock("POST", "/api/v1/courses/5/assignments/8/submissions/update_grades")
            .match_body(Matcher::Json(json!({
                "grade_data": {"101": {"posted_grade": "85", "text_comment": "Great job"}}
            })))
            .with_status(200)
            .with_body(json!({"id": 77, "workflow_state": "queued"}).to_string())
            .create_async()
            .await;
        let progress = server
            .mock("GET", "/api/v1/progress/77")
            .with_status(200)
            .with_body(json!({"id": 77, "workflow_state": "completed"}).to_string())
            .create_async()
            .await;

        let mut batch = GradeBatch::new();
        batch.insert(
            "101".into(),
            GradeEntry {
                posted_grade: "85".into(),
                text_comment: Some("Great job".into()),
            },
        );

        let client = client_for(&server);
        let job = client.submit_grades(5, 8, &batch).await?;
        assert_eq!(job.id, 77);
        assert_eq!(job.state, JobState::Queued);

        let polled = client.get_job_status(77).await?;
        assert_eq!(polled.state, JobState::Completed);

        submit.assert_async().await;
        progress.assert_async().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_quiz_submissions_are_unwrapped() -> Result<()> {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/api/v1/courses/5/quizzes/3/submissions")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                json!({"quiz_submissions": [{"id": 1, "user_id": 101, "score": 9.5}]}).to_string(),
            )
            .create_async()
            .await;

        let submissions = client_for(&server).list_quiz_submissions(5, 3).await?;

        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].score, Some(9.5));
        Ok(())
    }
}
