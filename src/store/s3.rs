use std::sync::Arc;

use aws_config::{
    profile::{ProfileFileCredentialsProvider, ProfileFileRegionProvider},
    BehaviorVersion,
};
use aws_credential_types::{provider::ProvideCredentials, Credentials};
use object_store::{aws::AmazonS3Builder, ObjectStore};

use super::{ArrayStore, HandleCache, MetadataStore, StoreCreateError, StoreError, DATASETS_FOLDER};
use crate::{
    config::{DatasetConfig, ARRAY_SUFFIX},
    storage::{
        storage_adapter::PrefixStorageAdapter, store::ObjectStorage,
        ReadableWritableListableStorage, StoreKey, StorePrefix,
    },
};

/// Connection options of an [`S3`] store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct S3Options {
    /// A named profile of the shared AWS config and credentials files.
    ///
    /// The profile is resolved as the AWS SDKs do, including `credential_process`, SSO and assumed role profiles. If
    /// unset, credentials are read from the environment.
    pub profile: Option<String>,
    /// The AWS region, overriding the profile and environment.
    pub region: Option<String>,
    /// A custom endpoint, for S3 compatible services.
    pub endpoint: Option<String>,
    /// Allow plain HTTP endpoints.
    pub allow_http: bool,
}

enum ObjectStoreSource {
    Aws(S3Options),
    Provided(Arc<dyn ObjectStore>),
}

/// A store in an S3 bucket.
///
/// The dataset store of dataset key `key` is at `s3://{bucket}/datasets/{key}.zarr` unless a custom output path is
/// configured. Object store clients are built on first use.
pub struct S3 {
    config: DatasetConfig,
    bucket: String,
    source: ObjectStoreSource,
    filesystem: HandleCache<ReadableWritableListableStorage>,
    mapping: HandleCache<ReadableWritableListableStorage>,
}

impl std::fmt::Debug for S3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3")
            .field("config", &self.config)
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Display for S3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "S3")
    }
}

impl S3 {
    /// Create an S3 store of the dataset configured by `config` in `bucket`.
    ///
    /// # Errors
    /// Returns [`StoreCreateError::EmptyBucket`] if `bucket` is empty, or [`StoreCreateError::InvalidCustomPath`] if
    /// the custom output path of `config` is in another bucket.
    pub fn new(
        config: DatasetConfig,
        bucket: impl Into<String>,
        options: S3Options,
    ) -> Result<Self, StoreCreateError> {
        Self::from_source(config, bucket.into(), ObjectStoreSource::Aws(options))
    }

    /// Create an S3 store of the dataset configured by `config` in `bucket`, served by `object_store`.
    ///
    /// # Errors
    /// See [`S3::new`].
    pub fn with_object_store(
        config: DatasetConfig,
        bucket: impl Into<String>,
        object_store: Arc<dyn ObjectStore>,
    ) -> Result<Self, StoreCreateError> {
        Self::from_source(
            config,
            bucket.into(),
            ObjectStoreSource::Provided(object_store),
        )
    }

    fn from_source(
        config: DatasetConfig,
        bucket: String,
        source: ObjectStoreSource,
    ) -> Result<Self, StoreCreateError> {
        if bucket.is_empty() {
            return Err(StoreCreateError::EmptyBucket);
        }
        if let Some(path) = &config.custom_output_path {
            if path.starts_with("s3://") && !path.starts_with(&format!("s3://{bucket}/")) {
                return Err(StoreCreateError::InvalidCustomPath(path.clone()));
            }
        }
        Ok(Self {
            config,
            bucket,
            source,
            filesystem: HandleCache::new(),
            mapping: HandleCache::new(),
        })
    }

    /// The bucket name.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// The prefix of the dataset store in the bucket.
    fn dataset_prefix(&self) -> Result<StorePrefix, StoreError> {
        let path = match &self.config.custom_output_path {
            Some(path) => path
                .strip_prefix(&format!("s3://{}/", self.bucket))
                .unwrap_or(path)
                .to_string(),
            None => format!("{DATASETS_FOLDER}/{}.{ARRAY_SUFFIX}", self.config.key()),
        };
        Ok(StorePrefix::from_path(&path)?)
    }

    fn build_object_store(&self) -> Result<Arc<dyn ObjectStore>, StoreError> {
        let options = match &self.source {
            ObjectStoreSource::Provided(object_store) => return Ok(object_store.clone()),
            ObjectStoreSource::Aws(options) => options,
        };
        let mut builder = match &options.profile {
            Some(profile) => {
                let (credentials, region) = resolve_profile(profile)?;
                tracing::debug!(profile = %profile, region = ?region, "resolved AWS profile");
                let mut builder = AmazonS3Builder::new()
                    .with_access_key_id(credentials.access_key_id())
                    .with_secret_access_key(credentials.secret_access_key());
                if let Some(session_token) = credentials.session_token() {
                    builder = builder.with_token(session_token);
                }
                if let Some(region) = region {
                    builder = builder.with_region(region);
                }
                builder
            }
            None => AmazonS3Builder::from_env(),
        };
        builder = builder.with_bucket_name(&self.bucket);
        if let Some(region) = &options.region {
            builder = builder.with_region(region);
        }
        if let Some(endpoint) = &options.endpoint {
            builder = builder.with_endpoint(endpoint);
        }
        Ok(Arc::new(builder.with_allow_http(options.allow_http).build()?))
    }
}

/// Resolve the credentials and region of the named AWS `profile`.
///
/// Only the shared config and credentials files are consulted. Credentials in the environment are ignored.
fn resolve_profile(profile: &str) -> Result<(Credentials, Option<String>), StoreError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| StoreError::CredentialsError(err.to_string()))?;
    runtime.block_on(async {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .credentials_provider(
                ProfileFileCredentialsProvider::builder()
                    .profile_name(profile)
                    .build(),
            )
            .region(
                ProfileFileRegionProvider::builder()
                    .profile_name(profile)
                    .build(),
            )
            .load()
            .await;
        let provider = sdk_config.credentials_provider().ok_or_else(|| {
            StoreError::CredentialsError(format!("no credentials provider for profile {profile}"))
        })?;
        let credentials = provider
            .provide_credentials()
            .await
            .map_err(|err| StoreError::CredentialsError(format!("profile {profile}: {err}")))?;
        let region = sdk_config.region().map(ToString::to_string);
        Ok((credentials, region))
    })
}

impl ArrayStore for S3 {
    fn config(&self) -> &DatasetConfig {
        &self.config
    }

    fn path(&self) -> String {
        match &self.config.custom_output_path {
            Some(path) => path.clone(),
            None => format!(
                "s3://{}/{DATASETS_FOLDER}/{}.{ARRAY_SUFFIX}",
                self.bucket,
                self.config.key()
            ),
        }
    }

    fn filesystem_handle(&self, refresh: bool) -> Result<ReadableWritableListableStorage, StoreError> {
        self.filesystem.get_or_try_init(refresh, || {
            tracing::debug!(bucket = %self.bucket, "building object store client");
            let storage: ReadableWritableListableStorage =
                Arc::new(ObjectStorage::new(self.build_object_store()?)?);
            Ok(storage)
        })
    }

    fn key_mapping(&self, refresh: bool) -> Result<ReadableWritableListableStorage, StoreError> {
        self.mapping.get_or_try_init(refresh, || {
            let prefix = self.dataset_prefix()?;
            tracing::debug!(bucket = %self.bucket, prefix = %prefix, "building key mapping");
            let mapping: ReadableWritableListableStorage = Arc::new(PrefixStorageAdapter::new(
                self.filesystem_handle(refresh)?,
                prefix,
            ));
            Ok(mapping)
        })
    }
}

impl MetadataStore for S3 {
    fn render_location(&self, key: &StoreKey) -> String {
        format!("s3://{}/{key}", self.bucket)
    }
}
