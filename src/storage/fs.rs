use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::{BlobStore, PutOptions};

/// Local directory backend, handy for development. URLs are `file://` paths under the root.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl AsRef<Path>) -> anyhow::Result<Self> {
        Ok(Self {
            root: std::path::absolute(root.as_ref())?,
        })
    }

    fn path_for_key(&self, key: &str) -> anyhow::Result<PathBuf> {
        let relative = Path::new(key);
        if key.is_empty()
            || !relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
        {
            anyhow::bail!("invalid blob key: {key:?}");
        }
        Ok(self.root.join(relative))
    }

    fn path_for_url(&self, url: &str) -> anyhow::Result<PathBuf> {
        let path = url
            .strip_prefix("file://")
            .map(PathBuf::from)
            .ok_or_else(|| anyhow::anyhow!("not a file URL: {url}"))?;
        if !path.starts_with(&self.root)
            || path.components().any(|c| matches!(c, Component::ParentDir))
        {
            anyhow::bail!("blob URL outside store root: {url}");
        }
        Ok(path)
    }
}

#[async_trait::async_trait]
impl BlobStore for FsBlobStore {
    #[tracing::instrument(name = "blob.fs.put", skip(self, content))]
    async fn put(&self, key: &str, content: &str, options: PutOptions) -> anyhow::Result<String> {
        let path = self.path_for_key(key)?;

        if !options.overwrite && fs::try_exists(&path).await? {
            anyhow::bail!("blob already exists at {key}; overwrite not allowed");
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write then rename so readers never observe a half-written body.
        let tmp = path.with_extension("tmp");
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(content.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp, &path).await?;

        Ok(format!("file://{}", path.display()))
    }

    #[tracing::instrument(name = "blob.fs.get", skip(self))]
    async fn get(&self, url: &str) -> anyhow::Result<String> {
        let path = self.path_for_url(url)?;
        Ok(fs::read_to_string(path).await?)
    }

    #[tracing::instrument(name = "blob.fs.delete", skip(self))]
    async fn delete(&self, url: &str) -> anyhow::Result<()> {
        let path = self.path_for_url(url)?;
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &str {
        "filesystem"
    }
}
