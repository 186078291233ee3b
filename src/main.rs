/*!
 * VOL Async - Demo Entry Point
 *
 * Builds a connector over the in-memory backend and drives a small group
 * tree through every operation kind, in both completion modes:
 * - create/open (wait and detach)
 * - get/specific/optional
 * - close, then stats as JSON
 */

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tracing::info;

use vol_async::{
    init_tracing, keys, CompletionMode, Connector, ConnectorConfig, GroupCreateArgs, GroupGet,
    GroupGetOutput, GroupOpenArgs, GroupOptional, GroupSpecific, Location, MemoryBackend,
    ObjectRef, ObjectStatus, OptionalOutput, PlistClass,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    // Handlers and waits block, so keep them off the async workers
    tokio::task::spawn_blocking(run)
        .await
        .context("demo thread panicked")?
}

fn run() -> Result<()> {
    let config = ConnectorConfig::from_env().context("loading VOL_ASYNC_* configuration")?;
    info!(scheduler = %config.scheduler, workers = config.workers, "starting demo");

    let backend = Arc::new(MemoryBackend::new());
    let connector = Connector::builder()
        .with_config(config)
        .with_backend(backend.clone())
        .build()?;
    let plists = connector.plists().clone();

    let root = connector.attach_root(backend.open_root(), backend.id(), "/");

    let create = |parent: &ObjectRef, name: &str, mode: CompletionMode| {
        let args = GroupCreateArgs {
            location: Location::SelfObject,
            name: name.to_string(),
            lcpl: plists
                .create(PlistClass::LinkCreate)
                .with(keys::CREATE_INTERMEDIATE_GROUP, "true"),
            gcpl: plists
                .create(PlistClass::GroupCreate)
                .with(keys::TRACK_CREATION_ORDER, "true"),
            gapl: plists.create(PlistClass::GroupAccess),
        };
        connector.group_create(parent, args, plists.create(PlistClass::DataTransfer), mode)
    };

    // Synchronous create
    let (data, done) = create(&root, "data", CompletionMode::Wait)?;
    connector.wait(done)?;
    info!(object = %data.id(), status = %data.status(), "created /data");

    // Detached creates: the objects are usable before their handlers run
    let mut runs = Vec::new();
    for i in 0..4 {
        let (run, _) = create(&data, &format!("run{}", i), CompletionMode::Detach)?;
        runs.push(run);
    }
    // Chained under a still-initializing parent
    let (nested, _) = create(&runs[0], "raw/frames", CompletionMode::Detach)?;
    for run in runs.iter().chain(std::iter::once(&nested)) {
        if run.wait_settled(Some(connector.config().wait_timeout())) != ObjectStatus::Ready {
            bail!("{} did not become ready: {:?}", run.name(), run.error());
        }
    }

    let info = connector.group_get(
        &data,
        GroupGet::Info(Location::SelfObject),
        plists.create(PlistClass::DataTransfer),
        CompletionMode::Wait,
    )?;
    if let Some(GroupGetOutput::Info(info)) = connector.wait(info)? {
        info!(nlinks = info.nlinks, max_corder = info.max_corder, "group info");
    }

    let links = connector.group_optional(
        &data,
        GroupOptional::IterateLinks,
        plists.create(PlistClass::DataTransfer),
        CompletionMode::Wait,
    )?;
    if let Some(OptionalOutput::Links(names)) = connector.wait(links)? {
        info!(?names, "links in creation order");
    }

    let flush = connector.group_specific(
        &data,
        GroupSpecific::Flush,
        plists.create(PlistClass::DataTransfer),
        CompletionMode::Detach,
    )?;
    connector.wait(flush)?;

    // A failing create leaves a tombstone that must be released
    let (dup, done) = create(&root, "data", CompletionMode::Wait)?;
    if let Err(e) = connector.wait(done) {
        info!(error = %e, status = %dup.status(), "duplicate create failed as expected");
        connector.release(&dup)?;
    }

    let (reopened, done) = connector.group_open(
        &root,
        GroupOpenArgs {
            location: Location::SelfObject,
            name: "data/run1".to_string(),
            gapl: plists.create(PlistClass::GroupAccess),
        },
        plists.create(PlistClass::DataTransfer),
        CompletionMode::Wait,
    )?;
    connector.wait(done)?;

    // Children before parents
    for group in std::iter::once(&nested)
        .chain(runs.iter())
        .chain([&reopened, &data, &root])
    {
        let done =
            connector.group_close(group, plists.create(PlistClass::DataTransfer), CompletionMode::Wait)?;
        connector.wait(done)?;
    }

    connector.shutdown();
    let stats = connector.stats();
    println!("{}", serde_json::to_string_pretty(&stats)?);
    info!(live = stats.objects_live, open_plists = stats.open_plists, "demo finished");
    Ok(())
}
