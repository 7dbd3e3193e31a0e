use anyhow::{Context, Result};
use futures::{StreamExt, stream};
use tokio::{fs, io::AsyncWriteExt};
use tokio_util::io::ReaderStream;
use tracing_subscriber::EnvFilter;
use tus_staging_store::{AppendOptions, CreateOptions, HookError, ObjectInfo, OnInfo, UploadStore};

mod config;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config ---
    let cfg = config::AppConfig::from_env_and_args()?;
    tracing::info!("Staging upload with config: {:?}", cfg);

    let file = fs::File::open(&cfg.input)
        .await
        .with_context(|| format!("opening {}", cfg.input.display()))?;
    let upload_length = file.metadata().await?.len();

    // --- Create session ---
    let store = UploadStore::new();
    let options = CreateOptions::default()
        .with_length(upload_length)
        .with_metadata(cfg.metadata.clone());
    let upload_id = store.create(cfg.key.clone(), options).await.upload_id;
    tracing::info!("Created upload {} for key `{}` ({} bytes)", upload_id, cfg.key, upload_length);

    let append_options = AppendOptions::new().before_complete(|info, upload_id| async move {
        tracing::info!("Upload {} complete, promoting `{}`", upload_id, info.key);
        Ok::<(), HookError>(())
    });

    // --- Append one chunk per call, resuming from the acknowledged offset ---
    let mut chunks = ReaderStream::with_capacity(file, cfg.chunk_size);
    let mut offset = 0;
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.with_context(|| format!("reading {}", cfg.input.display()))?;
        let outcome = store
            .append(
                &upload_id,
                stream::iter([Ok::<_, std::io::Error>(chunk)]),
                Some(offset),
                append_options.clone(),
            )
            .await?;
        offset = outcome.offset;
        tracing::debug!("Upload {} at offset {}/{}", upload_id, offset, upload_length);
    }

    // Empty files complete on an empty append.
    if upload_length == 0 {
        store
            .append(&upload_id, stream::empty(), Some(0), append_options)
            .await?;
    }

    // --- Read the finalized object back ---
    let on_info: OnInfo = Box::new(|info: ObjectInfo| {
        tracing::info!(
            "Object ready: {} bytes, metadata {:?}",
            info.content_length,
            info.metadata
        );
    });
    let mut reader = store.create_read_stream(cfg.key.clone(), Some(on_info));
    let mut payload = Vec::new();
    while let Some(chunk) = reader.next().await {
        payload.extend_from_slice(&chunk?);
    }

    match &cfg.output {
        Some(path) => {
            let mut out = fs::File::create(path)
                .await
                .with_context(|| format!("creating {}", path.display()))?;
            out.write_all(&payload).await?;
            out.flush().await?;
            tracing::info!("Wrote {} bytes to {}", payload.len(), path.display());
        }
        None => tracing::info!("Read back {} bytes from `{}`", payload.len(), cfg.key),
    }

    // Let the info observer run before the runtime shuts down.
    tokio::task::yield_now().await;

    Ok(())
}
