//! Creates a Win32 app in Intune and uploads a sealed package to it.
//!
//! [`Uploader`] walks the fixed stage sequence over a [`GraphApi`] and a
//! [`BlobStorage`]: create the app, stage a content file, push the
//! encrypted payload as blocks, commit, then attach rules, assignments
//! and categories.
//!
//! [`GraphApi`]: intunepack_graph::GraphApi
//! [`BlobStorage`]: intunepack_graph::BlobStorage

mod error;
pub mod poll;
mod stage;
mod upload;
pub mod wire;

pub use error::UploadError;
pub use poll::{PollPolicy, PollState, poll_until};
pub use stage::{NoopObserver, UploadObserver, UploadStage};
pub use upload::{DEFAULT_CONCURRENCY, RemoteApp, UploadOptions, Uploader};

#[cfg(test)]
pub(crate) mod tests {
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Duration;

    use intunepack_graph::{ApiError, BlobStorage, BoxFuture, GraphApi};
    use intunepack_packager::{EncryptionInfo, PackagingResult};
    use intunepack_protocol::Job;
    use serde_json::{Value, json};

    use crate::stage::{UploadObserver, UploadStage};

    pub(crate) const SAS_URI: &str = "https://blob.test/c/b?sig=x";

    pub(crate) fn sample_job() -> Job {
        serde_json::from_value(json!({
            "id": "job-1",
            "tenantId": "tenant-1",
            "packageId": "7zip.7zip",
            "displayName": "7-Zip",
            "publisher": "Igor Pavlov",
            "version": "23.01",
            "installerUrl": "https://example.test/7z2301-x64.msi"
        }))
        .unwrap()
    }

    pub(crate) fn sample_package() -> PackagingResult {
        PackagingResult {
            artifact_path: PathBuf::from("/work/Output/Invoke-AppDeployToolkit.intunewin"),
            encrypted_content_path: PathBuf::from("/work/Upload/IntunePackage.intunewin"),
            file_name: "Invoke-AppDeployToolkit.intunewin".into(),
            setup_file: "Invoke-AppDeployToolkit.exe".into(),
            unencrypted_size: 4096,
            encrypted_size: 10,
            encryption_info: EncryptionInfo {
                encryption_key: "a2V5".into(),
                mac_key: "bWFj".into(),
                initialization_vector: "aXY=".into(),
                mac: "c2ln".into(),
                profile_identifier: "ProfileVersion1".into(),
                file_digest: "ZGlnZXN0".into(),
                file_digest_algorithm: "SHA256".into(),
            },
        }
    }

    #[derive(Debug, Clone)]
    pub(crate) struct Call {
        pub method: &'static str,
        pub path: String,
        pub body: Value,
    }

    /// Scripted Graph backend following the happy path unless told otherwise.
    pub(crate) struct MockGraph {
        pub calls: Mutex<Vec<Call>>,
        pub storage_state: &'static str,
        pub commit_state: &'static str,
        pub existing_rules: Vec<Value>,
        pub previous_assignments: Vec<Value>,
        pub fail_clear: bool,
    }

    impl Default for MockGraph {
        fn default() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                storage_state: "azureStorageUriRequestSuccess",
                commit_state: "commitFileSuccess",
                existing_rules: Vec::new(),
                previous_assignments: Vec::new(),
                fail_clear: false,
            }
        }
    }

    impl MockGraph {
        pub(crate) fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub(crate) fn find(&self, method: &str, suffix: &str) -> Vec<Call> {
            self.calls()
                .into_iter()
                .filter(|c| c.method == method && c.path.ends_with(suffix))
                .collect()
        }

        fn committed(&self) -> bool {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .any(|c| c.method == "POST" && c.path.ends_with("/commit"))
        }

        fn respond(&self, method: &'static str, path: &str, body: &Value) -> Result<Value, ApiError> {
            self.calls.lock().unwrap().push(Call {
                method,
                path: path.to_string(),
                body: body.clone(),
            });

            match method {
                "POST" if path == "deviceAppManagement/mobileApps" => Ok(json!({"id": "app-1"})),
                "POST" if path.ends_with("/contentVersions") => Ok(json!({"id": "1"})),
                "POST" if path.ends_with("/files") => Ok(json!({"id": "file-1"})),
                "POST" if path.ends_with("/commit") => Ok(Value::Null),
                "POST" if path.contains("/prev-app/assign") && self.fail_clear => {
                    Err(ApiError::Status {
                        status: 500,
                        body: "clear failed".into(),
                    })
                }
                "POST" => Ok(Value::Null),
                "PATCH" => Ok(Value::Null),
                "GET" if path.ends_with("/files/file-1") => {
                    if self.committed() {
                        Ok(json!({"uploadState": self.commit_state}))
                    } else if self.storage_state == "azureStorageUriRequestSuccess" {
                        Ok(json!({"uploadState": self.storage_state, "azureStorageUri": SAS_URI}))
                    } else {
                        Ok(json!({"uploadState": self.storage_state, "azureStorageUri": null}))
                    }
                }
                "GET" if path.ends_with("/assignments") => {
                    Ok(json!({"value": self.previous_assignments}))
                }
                "GET" => Ok(json!({"id": "app-1", "rules": self.existing_rules})),
                _ => Err(ApiError::Status {
                    status: 404,
                    body: path.to_string(),
                }),
            }
        }
    }

    impl GraphApi for MockGraph {
        fn get<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Value, ApiError>> {
            Box::pin(async move { self.respond("GET", path, &Value::Null) })
        }

        fn post<'a>(
            &'a self,
            path: &'a str,
            body: &'a Value,
        ) -> BoxFuture<'a, Result<Value, ApiError>> {
            Box::pin(async move { self.respond("POST", path, body) })
        }

        fn patch<'a>(
            &'a self,
            path: &'a str,
            body: &'a Value,
        ) -> BoxFuture<'a, Result<Value, ApiError>> {
            Box::pin(async move { self.respond("PATCH", path, body) })
        }
    }

    /// In-memory blob store recording block completion order.
    #[derive(Default)]
    pub(crate) struct MockBlob {
        pub completed: Mutex<Vec<String>>,
        pub received: Mutex<Vec<(String, Vec<u8>)>>,
        pub block_lists: Mutex<Vec<String>>,
        /// Extra latency per block id.
        pub delays: Vec<(String, Duration)>,
        pub fail_block: Option<String>,
    }

    impl BlobStorage for MockBlob {
        fn put_block<'a>(
            &'a self,
            _sas_uri: &'a str,
            block_id: &'a str,
            data: Vec<u8>,
        ) -> BoxFuture<'a, Result<(), ApiError>> {
            Box::pin(async move {
                if let Some((_, d)) = self.delays.iter().find(|(id, _)| id == block_id) {
                    tokio::time::sleep(*d).await;
                }
                if self.fail_block.as_deref() == Some(block_id) {
                    return Err(ApiError::Status {
                        status: 500,
                        body: "block rejected".into(),
                    });
                }
                self.completed.lock().unwrap().push(block_id.to_string());
                self.received
                    .lock()
                    .unwrap()
                    .push((block_id.to_string(), data));
                Ok(())
            })
        }

        fn put_block_list<'a>(
            &'a self,
            _sas_uri: &'a str,
            block_list_xml: String,
        ) -> BoxFuture<'a, Result<(), ApiError>> {
            Box::pin(async move {
                self.block_lists.lock().unwrap().push(block_list_xml);
                Ok(())
            })
        }
    }

    #[derive(Default)]
    pub(crate) struct RecordingObserver {
        pub stages: Mutex<Vec<UploadStage>>,
        pub progress: Mutex<Vec<u8>>,
    }

    impl UploadObserver for RecordingObserver {
        fn on_stage(&self, stage: UploadStage) -> BoxFuture<'_, ()> {
            Box::pin(async move { self.stages.lock().unwrap().push(stage) })
        }

        fn on_progress<'a>(&'a self, percent: u8, _message: &'a str) -> BoxFuture<'a, ()> {
            Box::pin(async move { self.progress.lock().unwrap().push(percent) })
        }
    }
}
