//! The Win32 app upload pipeline.

use std::path::Path;

use futures_util::{StreamExt, stream};
use intunepack_graph::{ApiError, BlobStorage, GraphApi};
use intunepack_packager::PackagingResult;
use intunepack_protocol::Job;
use intunepack_transfer::{BlockReader, DEFAULT_BLOCK_SIZE, TransferError, block_list_xml};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::error::UploadError;
use crate::poll::{PollError, PollPolicy, PollState, poll_until};
use crate::stage::{CHUNKS_END, UploadObserver, UploadStage, chunk_progress};
use crate::wire;

const APPS: &str = "deviceAppManagement/mobileApps";
const PORTAL_APP_URL: &str =
    "https://intune.microsoft.com/#view/Microsoft_Intune_Apps/SettingsMenu/~/0/appId/";

/// Parallel block PUTs when none is configured.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// The app created in the management service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteApp {
    pub id: String,
    /// Admin portal link to the app.
    pub url: String,
}

impl RemoteApp {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let url = format!("{PORTAL_APP_URL}{id}");
        Self { id, url }
    }
}

/// Tunables of one upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadOptions {
    pub block_size: usize,
    pub concurrency: usize,
    pub storage_poll: PollPolicy,
    pub commit_poll: PollPolicy,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            storage_poll: PollPolicy::STORAGE_URI,
            commit_poll: PollPolicy::COMMIT,
        }
    }
}

/// Drives one package through the upload stages.
///
/// Stages run strictly in order and each failure ends the upload; the only
/// retries are the two bounded polls.
pub struct Uploader<'a> {
    graph: &'a dyn GraphApi,
    blob: &'a dyn BlobStorage,
    options: UploadOptions,
}

impl<'a> Uploader<'a> {
    pub fn new(graph: &'a dyn GraphApi, blob: &'a dyn BlobStorage) -> Self {
        Self {
            graph,
            blob,
            options: UploadOptions::default(),
        }
    }

    pub fn with_options(mut self, options: UploadOptions) -> Self {
        self.options = options;
        self
    }

    /// Creates the app for `job`, uploads `package` and configures it.
    pub async fn upload(
        &self,
        job: &Job,
        package: &PackagingResult,
        observer: &dyn UploadObserver,
    ) -> Result<RemoteApp, UploadError> {
        // 1. App shell
        enter(observer, UploadStage::CreateApp).await;
        let created = self.graph.post(APPS, &wire::app_body(job, package)).await?;
        let app_id = string_field(&created, "id", UploadStage::CreateApp)?;
        info!(job_id = %job.id, app_id = %app_id, "app created");

        let lob = format!("{APPS}/{app_id}/microsoft.graph.win32LobApp");

        // 2. Content version
        enter(observer, UploadStage::CreateContentVersion).await;
        let version = self
            .graph
            .post(&format!("{lob}/contentVersions"), &json!({}))
            .await?;
        let version_id = string_field(&version, "id", UploadStage::CreateContentVersion)?;

        // 3. Content file record
        enter(observer, UploadStage::CreateContentFile).await;
        let content_name = package
            .encrypted_content_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| package.file_name.clone());
        let file = self
            .graph
            .post(
                &format!("{lob}/contentVersions/{version_id}/files"),
                &wire::content_file_body(package, &content_name),
            )
            .await?;
        let file_id = string_field(&file, "id", UploadStage::CreateContentFile)?;
        let file_path = format!("{lob}/contentVersions/{version_id}/files/{file_id}");

        // 4. Storage URI
        enter(observer, UploadStage::AwaitStorageUri).await;
        let sas_uri = self.await_storage_uri(&file_path).await?;

        // 5. Blocks
        enter(observer, UploadStage::UploadChunks).await;
        self.upload_blocks(&package.encrypted_content_path, &sas_uri, observer)
            .await?;

        // 6. Commit
        enter(observer, UploadStage::CommitFile).await;
        self.graph
            .post(
                &format!("{file_path}/commit"),
                &wire::commit_body(&package.encryption_info),
            )
            .await?;

        // 7. Processing
        enter(observer, UploadStage::AwaitProcessing).await;
        self.await_commit(&file_path).await?;

        // 8. Finalize
        enter(observer, UploadStage::CommitVersion).await;
        self.graph
            .patch(
                &format!("{APPS}/{app_id}"),
                &json!({
                    "@odata.type": "#microsoft.graph.win32LobApp",
                    "committedContentVersion": version_id,
                }),
            )
            .await?;

        // 9. Rules
        enter(observer, UploadStage::AddRules).await;
        self.add_rules(job, &app_id).await?;

        // 10. Assignments
        enter(observer, UploadStage::ApplyAssignments).await;
        self.apply_assignments(job, &app_id).await?;

        // 11. Categories
        enter(observer, UploadStage::ApplyCategories).await;
        self.apply_categories(job, &app_id).await?;

        observer.on_progress(100, "Upload complete").await;
        info!(job_id = %job.id, app_id = %app_id, "upload complete");
        Ok(RemoteApp::new(app_id))
    }

    async fn await_storage_uri(&self, file_path: &str) -> Result<String, UploadError> {
        let stage = UploadStage::AwaitStorageUri;
        let result = poll_until(self.options.storage_poll, move || async move {
            let file = self.graph.get(file_path).await?;
            let state = upload_state(&file);
            let uri = file
                .get("azureStorageUri")
                .and_then(Value::as_str)
                .filter(|u| !u.is_empty());
            Ok::<_, ApiError>(match (state, uri) {
                ("azureStorageUriRequestSuccess", Some(uri)) => PollState::Ready(uri.to_string()),
                ("azureStorageUriRequestFailed", _) => PollState::Failed(state.to_string()),
                _ => PollState::Pending,
            })
        })
        .await;
        result.map_err(|e| poll_error(stage, e))
    }

    async fn await_commit(&self, file_path: &str) -> Result<(), UploadError> {
        let stage = UploadStage::AwaitProcessing;
        let result = poll_until(self.options.commit_poll, move || async move {
            let file = self.graph.get(file_path).await?;
            Ok::<_, ApiError>(match upload_state(&file) {
                "commitFileSuccess" => PollState::Ready(()),
                "commitFileFailed" => PollState::Failed("commitFileFailed".into()),
                _ => PollState::Pending,
            })
        })
        .await;
        result.map_err(|e| poll_error(stage, e))
    }

    async fn upload_blocks(
        &self,
        path: &Path,
        sas_uri: &str,
        observer: &dyn UploadObserver,
    ) -> Result<(), UploadError> {
        let block_size = self.options.block_size;
        let plan = BlockReader::new(path, block_size)?.plan();
        let total = plan.block_count();
        debug!(total, bytes = plan.file_size, "uploading blocks");

        let puts = stream::iter(0..total)
            .map(|index| {
                let path = path.to_path_buf();
                async move {
                    let block = tokio::task::spawn_blocking(move || -> Result<_, TransferError> {
                        BlockReader::new(&path, block_size)?.read_block(index)
                    })
                    .await
                    .map_err(|e| TransferError::Io(std::io::Error::other(e)))??;
                    self.blob
                        .put_block(sas_uri, &block.id, block.data)
                        .await?;
                    Ok::<usize, UploadError>(block.index)
                }
            })
            .buffer_unordered(self.options.concurrency.max(1));
        futures_util::pin_mut!(puts);

        let mut done = 0;
        while let Some(result) = puts.next().await {
            let index = result?;
            done += 1;
            debug!(index, done, total, "block uploaded");
            observer
                .on_progress(chunk_progress(done, total), UploadStage::UploadChunks.message())
                .await;
        }

        // Block order on the server follows this list, not upload order.
        self.blob
            .put_block_list(sas_uri, block_list_xml(&plan.block_ids()))
            .await?;
        observer
            .on_progress(CHUNKS_END, UploadStage::UploadChunks.message())
            .await;
        Ok(())
    }

    async fn add_rules(&self, job: &Job, app_id: &str) -> Result<(), UploadError> {
        let app_path = format!("{APPS}/{app_id}");
        let current = self.graph.get(&app_path).await?;
        let existing = current
            .get("rules")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let rules = wire::union_rules(&existing, wire::job_rules(job));
        debug!(app_id, rules = rules.len(), "setting rules");
        self.graph
            .patch(
                &app_path,
                &json!({
                    "@odata.type": "#microsoft.graph.win32LobApp",
                    "rules": rules,
                }),
            )
            .await?;
        Ok(())
    }

    async fn apply_assignments(&self, job: &Job, app_id: &str) -> Result<(), UploadError> {
        let mut assignments: Vec<Value> = job.assignments.iter().map(wire::assignment).collect();

        if assignments.is_empty()
            && let Some(migration) = &job.migration
            && migration.carry_over_assignments
        {
            let previous = self
                .graph
                .get(&format!(
                    "{APPS}/{}/assignments",
                    migration.previous_app_id
                ))
                .await?;
            assignments = previous
                .get("value")
                .and_then(Value::as_array)
                .map(|items| items.iter().filter_map(wire::carried_assignment).collect())
                .unwrap_or_default();
            info!(
                previous_app_id = %migration.previous_app_id,
                count = assignments.len(),
                "carrying over assignments"
            );
        }

        if !assignments.is_empty() {
            self.graph
                .post(
                    &format!("{APPS}/{app_id}/assign"),
                    &json!({ "mobileAppAssignments": assignments }),
                )
                .await?;
        }

        if let Some(migration) = &job.migration
            && migration.remove_previous_assignments
        {
            self.clear_assignments(&migration.previous_app_id).await;
        }

        Ok(())
    }

    /// Best-effort: failures are logged and dropped.
    async fn clear_assignments(&self, app_id: &str) {
        let result = self
            .graph
            .post(
                &format!("{APPS}/{app_id}/assign"),
                &json!({ "mobileAppAssignments": [] }),
            )
            .await;
        match result {
            Ok(_) => info!(app_id, "cleared previous app assignments"),
            Err(e) => warn!(app_id, error = %e, "failed to clear previous app assignments"),
        }
    }

    async fn apply_categories(&self, job: &Job, app_id: &str) -> Result<(), UploadError> {
        let base = self.graph.base_url().trim_end_matches('/');
        for category in &job.categories {
            let body = json!({
                "@odata.id": format!("{base}/deviceAppManagement/mobileAppCategories/{}", category.id),
            });
            self.graph
                .post(&format!("{APPS}/{app_id}/categories/$ref"), &body)
                .await?;
        }
        Ok(())
    }
}

async fn enter(observer: &dyn UploadObserver, stage: UploadStage) {
    debug!(%stage, "upload stage");
    observer.on_stage(stage).await;
    observer.on_progress(stage.checkpoint(), stage.message()).await;
}

fn upload_state(file: &Value) -> &str {
    file.get("uploadState")
        .and_then(Value::as_str)
        .unwrap_or_default()
}

fn string_field(
    body: &Value,
    field: &'static str,
    stage: UploadStage,
) -> Result<String, UploadError> {
    body.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or(UploadError::MissingField { stage, field })
}

fn poll_error(stage: UploadStage, e: PollError<ApiError>) -> UploadError {
    match e {
        PollError::Exhausted { attempts } => UploadError::Timeout { stage, attempts },
        PollError::Failed(state) => UploadError::ServerState { stage, state },
        PollError::Probe(e) => UploadError::Api(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::NoopObserver;
    use crate::tests::{MockBlob, MockGraph, RecordingObserver, sample_job, sample_package};
    use intunepack_protocol::{
        Assignment, AssignmentIntent, AssignmentTarget, CategoryRef, MigrationDirective,
    };
    use intunepack_transfer::block_id;
    use std::time::Duration;
    use tokio::time::Instant;

    const BLOCK: usize = 4;

    fn options() -> UploadOptions {
        UploadOptions {
            block_size: BLOCK,
            ..UploadOptions::default()
        }
    }

    /// Writes a payload of `len` bytes and returns a package pointing at it.
    fn package_with_payload(dir: &tempfile::TempDir, len: usize) -> PackagingResult {
        let path = dir.path().join("IntunePackage.intunewin");
        std::fs::write(&path, vec![7u8; len]).unwrap();
        PackagingResult {
            encrypted_content_path: path,
            encrypted_size: len as u64,
            ..sample_package()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stages_run_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let package = package_with_payload(&dir, 10);
        let graph = MockGraph::default();
        let blob = MockBlob::default();
        let observer = RecordingObserver::default();

        let app = Uploader::new(&graph, &blob)
            .with_options(options())
            .upload(&sample_job(), &package, &observer)
            .await
            .unwrap();

        assert_eq!(app.id, "app-1");
        assert!(app.url.ends_with("/appId/app-1"));
        assert_eq!(*observer.stages.lock().unwrap(), UploadStage::ALL.to_vec());

        let progress = observer.progress.lock().unwrap().clone();
        assert!(progress.windows(2).all(|w| w[0] <= w[1]), "{progress:?}");
        assert_eq!(progress.first(), Some(&5));
        assert_eq!(progress.last(), Some(&100));

        let calls = graph.calls();
        let commit_version = calls
            .iter()
            .position(|c| c.method == "PATCH" && c.body.get("committedContentVersion").is_some())
            .unwrap();
        let add_rules = calls
            .iter()
            .position(|c| c.method == "PATCH" && c.body.get("rules").is_some())
            .unwrap();
        assert!(commit_version < add_rules);
        assert_eq!(calls[commit_version].body["committedContentVersion"], "1");
    }

    #[tokio::test(start_paused = true)]
    async fn content_file_and_commit_payloads() {
        let dir = tempfile::tempdir().unwrap();
        let package = package_with_payload(&dir, 10);
        let graph = MockGraph::default();
        let blob = MockBlob::default();

        Uploader::new(&graph, &blob)
            .with_options(options())
            .upload(&sample_job(), &package, &NoopObserver)
            .await
            .unwrap();

        let file = &graph.find("POST", "/contentVersions/1/files")[0];
        assert_eq!(file.body["name"], "IntunePackage.intunewin");
        assert_eq!(file.body["size"], 4096);
        assert_eq!(file.body["sizeEncrypted"], 10);

        let commit = &graph.find("POST", "/files/file-1/commit")[0];
        assert_eq!(commit.body["fileEncryptionInfo"]["macKey"], "bWFj");
    }

    #[tokio::test(start_paused = true)]
    async fn block_list_is_ascending_whatever_the_completion_order() {
        let dir = tempfile::tempdir().unwrap();
        // 4 blocks of 4 bytes; earlier blocks finish last.
        let package = package_with_payload(&dir, 14);
        let graph = MockGraph::default();
        let blob = MockBlob {
            delays: (0..4)
                .map(|i| (block_id(i), Duration::from_millis(40 - 10 * i as u64)))
                .collect(),
            ..MockBlob::default()
        };

        Uploader::new(&graph, &blob)
            .with_options(options())
            .upload(&sample_job(), &package, &NoopObserver)
            .await
            .unwrap();

        let completed = blob.completed.lock().unwrap().clone();
        let ascending: Vec<String> = (0..4).map(block_id).collect();
        assert_eq!(completed.len(), 4);
        assert_ne!(completed, ascending);

        let lists = blob.block_lists.lock().unwrap().clone();
        assert_eq!(lists, vec![block_list_xml(&ascending)]);
    }

    #[tokio::test(start_paused = true)]
    async fn each_block_carries_its_slice_of_the_payload() {
        let dir = tempfile::tempdir().unwrap();
        let payload: Vec<u8> = (0u8..14).collect();
        let path = dir.path().join("IntunePackage.intunewin");
        std::fs::write(&path, &payload).unwrap();
        let package = PackagingResult {
            encrypted_content_path: path,
            encrypted_size: payload.len() as u64,
            ..sample_package()
        };
        let graph = MockGraph::default();
        let blob = MockBlob::default();

        Uploader::new(&graph, &blob)
            .with_options(options())
            .upload(&sample_job(), &package, &NoopObserver)
            .await
            .unwrap();

        let mut received = blob.received.lock().unwrap().clone();
        received.sort();
        let mut expected: Vec<(String, Vec<u8>)> = payload
            .chunks(BLOCK)
            .enumerate()
            .map(|(i, chunk)| (block_id(i), chunk.to_vec()))
            .collect();
        expected.sort();
        assert_eq!(received, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn storage_uri_poll_gives_up_after_sixty_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let package = package_with_payload(&dir, 10);
        let graph = MockGraph {
            storage_state: "azureStorageUriRequestPending",
            ..MockGraph::default()
        };
        let blob = MockBlob::default();
        let start = Instant::now();

        let err = Uploader::new(&graph, &blob)
            .with_options(options())
            .upload(&sample_job(), &package, &NoopObserver)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            UploadError::Timeout {
                stage: UploadStage::AwaitStorageUri,
                attempts: 60
            }
        ));
        assert_eq!(graph.find("GET", "/files/file-1").len(), 60);
        assert_eq!(start.elapsed(), Duration::from_secs(59 * 2));
        assert!(blob.completed.lock().unwrap().is_empty());
        assert!(blob.block_lists.lock().unwrap().is_empty());
        assert!(graph.find("POST", "/commit").is_empty());
        assert!(graph.find("PATCH", "").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn storage_request_failure_is_server_state() {
        let dir = tempfile::tempdir().unwrap();
        let package = package_with_payload(&dir, 10);
        let graph = MockGraph {
            storage_state: "azureStorageUriRequestFailed",
            ..MockGraph::default()
        };
        let blob = MockBlob::default();

        let err = Uploader::new(&graph, &blob)
            .with_options(options())
            .upload(&sample_job(), &package, &NoopObserver)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            UploadError::ServerState { stage: UploadStage::AwaitStorageUri, ref state }
                if state == "azureStorageUriRequestFailed"
        ));
        assert_eq!(graph.find("GET", "/files/file-1").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn commit_failure_stops_before_finalizing() {
        let dir = tempfile::tempdir().unwrap();
        let package = package_with_payload(&dir, 10);
        let graph = MockGraph {
            commit_state: "commitFileFailed",
            ..MockGraph::default()
        };
        let blob = MockBlob::default();

        let err = Uploader::new(&graph, &blob)
            .with_options(options())
            .upload(&sample_job(), &package, &NoopObserver)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            UploadError::ServerState {
                stage: UploadStage::AwaitProcessing,
                ..
            }
        ));
        assert!(graph.find("PATCH", "").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn block_failure_aborts_upload() {
        let dir = tempfile::tempdir().unwrap();
        let package = package_with_payload(&dir, 10);
        let graph = MockGraph::default();
        let blob = MockBlob {
            fail_block: Some(block_id(1)),
            ..MockBlob::default()
        };

        let err = Uploader::new(&graph, &blob)
            .with_options(options())
            .upload(&sample_job(), &package, &NoopObserver)
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Api(_)));
        assert!(blob.block_lists.lock().unwrap().is_empty());
        assert!(graph.find("POST", "/commit").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_app_id_is_reported() {
        struct NoId;
        impl GraphApi for NoId {
            fn get<'a>(&'a self, _: &'a str) -> intunepack_graph::BoxFuture<'a, Result<Value, ApiError>> {
                Box::pin(async { Ok(Value::Null) })
            }
            fn post<'a>(
                &'a self,
                _: &'a str,
                _: &'a Value,
            ) -> intunepack_graph::BoxFuture<'a, Result<Value, ApiError>> {
                Box::pin(async { Ok(json!({})) })
            }
            fn patch<'a>(
                &'a self,
                _: &'a str,
                _: &'a Value,
            ) -> intunepack_graph::BoxFuture<'a, Result<Value, ApiError>> {
                Box::pin(async { Ok(Value::Null) })
            }
        }

        let blob = MockBlob::default();
        let err = Uploader::new(&NoId, &blob)
            .upload(&sample_job(), &sample_package(), &NoopObserver)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            UploadError::MissingField {
                stage: UploadStage::CreateApp,
                field: "id"
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn rules_are_merged_with_existing() {
        let dir = tempfile::tempdir().unwrap();
        let package = package_with_payload(&dir, 10);
        let existing = json!({"@odata.type": "#microsoft.graph.win32LobAppRegistryRule", "ruleType": "requirement"});
        let graph = MockGraph {
            existing_rules: vec![existing.clone()],
            ..MockGraph::default()
        };
        let blob = MockBlob::default();

        Uploader::new(&graph, &blob)
            .with_options(options())
            .upload(&sample_job(), &package, &NoopObserver)
            .await
            .unwrap();

        let patch = graph
            .find("PATCH", "mobileApps/app-1")
            .into_iter()
            .find(|c| c.body.get("rules").is_some())
            .unwrap();
        let rules = patch.body["rules"].as_array().unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0], existing);
        assert_eq!(rules[1]["fileOrFolderName"], "7-Zip");
    }

    #[tokio::test(start_paused = true)]
    async fn update_only_assignments_are_sent_as_required() {
        let dir = tempfile::tempdir().unwrap();
        let package = package_with_payload(&dir, 10);
        let mut job = sample_job();
        job.assignments = vec![Assignment {
            target: AssignmentTarget::Group {
                group_id: "g1".into(),
            },
            intent: AssignmentIntent::UpdateOnly,
            filter: None,
        }];
        let graph = MockGraph::default();
        let blob = MockBlob::default();

        Uploader::new(&graph, &blob)
            .with_options(options())
            .upload(&job, &package, &NoopObserver)
            .await
            .unwrap();

        let assign = &graph.find("POST", "app-1/assign")[0];
        let sent = &assign.body["mobileAppAssignments"][0];
        assert_eq!(sent["intent"], "required");
        assert_eq!(sent["target"]["groupId"], "g1");
    }

    #[tokio::test(start_paused = true)]
    async fn no_assignments_means_no_assign_call() {
        let dir = tempfile::tempdir().unwrap();
        let package = package_with_payload(&dir, 10);
        let graph = MockGraph::default();
        let blob = MockBlob::default();

        Uploader::new(&graph, &blob)
            .with_options(options())
            .upload(&sample_job(), &package, &NoopObserver)
            .await
            .unwrap();

        assert!(graph.find("POST", "/assign").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn previous_assignments_are_carried_over() {
        let dir = tempfile::tempdir().unwrap();
        let package = package_with_payload(&dir, 10);
        let mut job = sample_job();
        job.migration = Some(MigrationDirective {
            previous_app_id: "prev-app".into(),
            carry_over_assignments: true,
            remove_previous_assignments: false,
        });
        let graph = MockGraph {
            previous_assignments: vec![json!({
                "id": "a1",
                "intent": "available",
                "target": {"@odata.type": "#microsoft.graph.allLicensedUsersAssignmentTarget"},
            })],
            ..MockGraph::default()
        };
        let blob = MockBlob::default();

        Uploader::new(&graph, &blob)
            .with_options(options())
            .upload(&job, &package, &NoopObserver)
            .await
            .unwrap();

        assert_eq!(graph.find("GET", "prev-app/assignments").len(), 1);
        let assign = &graph.find("POST", "app-1/assign")[0];
        let sent = &assign.body["mobileAppAssignments"][0];
        assert_eq!(sent["intent"], "available");
        assert!(sent.get("id").is_none());
        assert!(graph.find("POST", "prev-app/assign").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_clear_of_previous_app_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let package = package_with_payload(&dir, 10);
        let mut job = sample_job();
        job.migration = Some(MigrationDirective {
            previous_app_id: "prev-app".into(),
            carry_over_assignments: false,
            remove_previous_assignments: true,
        });
        let graph = MockGraph {
            fail_clear: true,
            ..MockGraph::default()
        };
        let blob = MockBlob::default();
        let observer = RecordingObserver::default();

        let app = Uploader::new(&graph, &blob)
            .with_options(options())
            .upload(&job, &package, &observer)
            .await
            .unwrap();

        assert_eq!(app.id, "app-1");
        let clear = &graph.find("POST", "prev-app/assign")[0];
        assert_eq!(clear.body["mobileAppAssignments"], json!([]));
        assert_eq!(
            observer.stages.lock().unwrap().last(),
            Some(&UploadStage::ApplyCategories)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn categories_are_referenced_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let package = package_with_payload(&dir, 10);
        let mut job = sample_job();
        job.categories = vec![
            CategoryRef {
                id: "cat-1".into(),
                name: Some("Utilities".into()),
            },
            CategoryRef {
                id: "cat-2".into(),
                name: None,
            },
        ];
        let graph = MockGraph::default();
        let blob = MockBlob::default();

        Uploader::new(&graph, &blob)
            .with_options(options())
            .upload(&job, &package, &NoopObserver)
            .await
            .unwrap();

        let refs = graph.find("POST", "app-1/categories/$ref");
        assert_eq!(refs.len(), 2);
        assert_eq!(
            refs[1].body["@odata.id"],
            "https://graph.microsoft.com/beta/deviceAppManagement/mobileAppCategories/cat-2"
        );
    }
}
