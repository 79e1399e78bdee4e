// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use clap::{Parser, Subcommand};
use log::{error, info};
use pagetree::collab::{CommentStore, EntryStore, NavigationLinks};
use pagetree::config::{Config, ValidatedConfig};
use pagetree::context::{Actor, RequestContext};
use pagetree::edit::{CreatePage, PageUpdate};
use pagetree::effects::{CacheGenerations, LogEventSink, Notice, NoticeLevel};
use pagetree::page::{EntryRef, PageMeta, normalize_keywords};
use pagetree::records::{
    COMMENTS_FILE, ENTRIES_FILE, NAVIGATION_FILE, YamlCommentStore, YamlEntryStore,
    YamlNavigationLinks,
};
use pagetree::reorder::parse_order_payload;
use pagetree::store::PageStore;
use pagetree::tree::PageNode;
use pagetree::{Collaborators, PageError, PageId, PageResult, PageService, PageStatus, util};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "pagetree", about = "Manage the page tree of a site")]
struct Args {
    /// Site root holding pagetree.yaml and the page store
    #[arg(short = 'C', long, default_value = ".")]
    root: PathBuf,

    /// Actor recorded in logs
    #[arg(long, default_value = "cli")]
    actor: String,

    /// Role of the actor; repeat for several
    #[arg(long = "role", default_value = "admin")]
    roles: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the page tree
    Tree {
        #[arg(long)]
        json: bool,
    },
    /// Print one page
    Show { id: PageId },
    /// Find the page a request path routes to
    Resolve { path: String },
    /// Create a page
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        slug: Option<String>,
        #[arg(long)]
        parent: Option<PageId>,
        #[arg(long, default_value = "draft")]
        status: PageStatus,
        #[arg(long)]
        home: bool,
        /// Navigation group to add a link to; repeat for several
        #[arg(long = "nav-group")]
        nav_groups: Vec<u64>,
        /// Create an empty entry of this type and link it
        #[arg(long)]
        entry_type: Option<String>,
        #[arg(long)]
        keywords: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Change a page
    Edit {
        id: PageId,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        slug: Option<String>,
        #[arg(long)]
        status: Option<PageStatus>,
        #[arg(long)]
        home: bool,
        #[arg(long)]
        keywords: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Apply a JSON order payload, e.g. '[{"id":2,"children":[{"id":4}]},{"id":1}]'
    Order {
        payload: Option<String>,
        /// Read the payload from a file instead
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Copy a page with all of its children
    Duplicate { id: PageId },
    /// Delete pages
    Delete {
        #[arg(required = true)]
        ids: Vec<PageId>,
    },
    /// Verify the route table against the tree
    Check {
        /// Rebuild every route record
        #[arg(long)]
        repair: bool,
    },
}

fn main() {
    let exit_code = run();
    std::process::exit(exit_code);
}

fn run() -> i32 {
    let args = Args::parse();

    let config = match Config::load_and_validate(&args.root) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("❌ {}", error);
            return 2;
        }
    };
    if let Err(error) = util::init_logger(config.log_level) {
        eprintln!("❌ Failed to initialize logger: {}", error);
        return 1;
    }

    match execute(&args, &config) {
        Ok(()) => 0,
        Err(error) => {
            eprintln!("❌ {}", error);
            1
        }
    }
}

struct Runtime {
    service: PageService,
    entries: Arc<YamlEntryStore>,
}

fn open_runtime(config: &ValidatedConfig) -> PageResult<Runtime> {
    let data_dir = config
        .store_file
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let store = PageStore::open(&config.store_file)?;
    let entries = Arc::new(YamlEntryStore::open(&data_dir.join(ENTRIES_FILE))?);
    let comments: Arc<dyn CommentStore> =
        Arc::new(YamlCommentStore::open(&data_dir.join(COMMENTS_FILE))?);
    let navigation: Arc<dyn NavigationLinks> =
        Arc::new(YamlNavigationLinks::open(&data_dir.join(NAVIGATION_FILE))?);
    let entry_store: Arc<dyn EntryStore> = entries.clone();

    let collaborators = Collaborators {
        events: Arc::new(LogEventSink),
        caches: Arc::new(CacheGenerations::new()),
        navigation,
        entries: entry_store,
        comments,
    };
    let service = PageService::new(
        store,
        config,
        Arc::new(config.roles.clone()),
        collaborators,
    );
    info!("Using page store {}", config.store_file.display());
    Ok(Runtime { service, entries })
}

fn execute(args: &Args, config: &ValidatedConfig) -> PageResult<()> {
    let runtime = open_runtime(config)?;
    let service = &runtime.service;
    let ctx = RequestContext::new(Actor::new(args.actor.clone(), args.roles.clone()));

    match &args.command {
        Command::Tree { json } => {
            let forest = service.tree()?;
            if *json {
                println!("{}", to_json(&forest)?);
            } else {
                print_forest(&forest, 0);
            }
        }
        Command::Show { id } => {
            let page = service.page(*id)?;
            let yaml = serde_yaml::to_string(&page)
                .map_err(|err| PageError::internal(format!("Failed to encode page: {}", err)))?;
            print!("{}", yaml);
        }
        Command::Resolve { path } => match service.resolve(path)? {
            Some(page) => println!("{}\t/{}\t{}", page.id, page.uri, page.title),
            None => {
                return Err(PageError::validation(format!("No page routes to '{}'", path)));
            }
        },
        Command::Create {
            title,
            slug,
            parent,
            status,
            home,
            nav_groups,
            entry_type,
            keywords,
            description,
        } => {
            let entry = match entry_type {
                Some(entry_type) => Some(runtime.entries.create(entry_type, BTreeMap::new())?),
                None => None,
            };
            let input = CreatePage {
                title: title.clone(),
                slug: slug.clone(),
                parent_id: *parent,
                type_id: None,
                entry,
                status: *status,
                is_home: *home,
                meta: build_meta(PageMeta::default(), keywords.as_deref(), description.as_deref())?,
                navigation_group_ids: nav_groups.clone(),
            };
            let created_entry = input.entry.clone();
            let completed = match service.create(&ctx, input) {
                Ok(completed) => completed,
                Err(err) => {
                    if let Some(entry) = created_entry {
                        discard_entry(&*runtime.entries, &entry);
                    }
                    return Err(err);
                }
            };
            let page = service.page(completed.value)?;
            println!("{}\t/{}", page.id, page.uri);
            print_notices(&completed.notices);
        }
        Command::Edit {
            id,
            title,
            slug,
            status,
            home,
            keywords,
            description,
        } => {
            let meta = if keywords.is_some() || description.is_some() {
                let current = service.page(*id)?.meta;
                Some(build_meta(current, keywords.as_deref(), description.as_deref())?)
            } else {
                None
            };
            let update = PageUpdate {
                title: title.clone(),
                slug: slug.clone(),
                status: *status,
                is_home: *home,
                meta,
            };
            let completed = service.update(&ctx, *id, update)?;
            println!("{}\t/{}", completed.value.id, completed.value.uri);
        }
        Command::Order { payload, file } => {
            let raw = match (payload, file) {
                (_, Some(path)) => std::fs::read_to_string(path).map_err(|err| {
                    PageError::validation(format!(
                        "Failed to read order payload '{}': {}",
                        path.display(),
                        err
                    ))
                })?,
                (Some(payload), None) => payload.clone(),
                (None, None) => {
                    return Err(PageError::validation("An order payload or --file is required"));
                }
            };
            let batch = parse_order_payload(&raw)?;
            let completed = service.reorder(&ctx, &batch)?;
            println!(
                "Ordered {} pages, {} moved, {} renamed",
                completed.value.placed.len(),
                completed.value.reparented.len(),
                completed.value.renamed.len()
            );
            print_notices(&completed.notices);
        }
        Command::Duplicate { id } => {
            let completed = service.duplicate(&ctx, *id)?;
            match completed.value {
                Some(report) => {
                    let top = service.page(report.top)?;
                    println!("{}\t/{}\t({} pages)", top.id, top.uri, report.created.len());
                }
                None => println!("Page {} does not exist; nothing duplicated", id),
            }
        }
        Command::Delete { ids } => {
            let completed = service.delete(&ctx, ids)?;
            print_notices(&completed.notices);
        }
        Command::Check { repair } => {
            let mismatches = service.check()?;
            for mismatch in &mismatches {
                println!("{:?}", mismatch);
            }
            if *repair && !mismatches.is_empty() {
                let rebuilt = service.repair(&ctx)?;
                println!("Rebuilt {} route records", rebuilt);
            } else if mismatches.is_empty() {
                println!("✅ Route table matches the page tree");
            } else {
                return Err(PageError::validation(format!(
                    "{} route mismatches found",
                    mismatches.len()
                )));
            }
        }
    }
    Ok(())
}

/// Removes an entry made for a page that was never committed.
fn discard_entry(entries: &dyn EntryStore, entry: &EntryRef) {
    match entries.delete_entry(entry) {
        Ok(()) => info!("Removed entry {} of the page that was not created", entry),
        Err(err) => error!("Could not remove orphaned entry {}: {}", entry, err),
    }
}

fn build_meta(
    mut meta: PageMeta,
    keywords: Option<&str>,
    description: Option<&str>,
) -> PageResult<PageMeta> {
    if let Some(raw) = keywords {
        meta.meta_keywords = normalize_keywords(raw).map_err(PageError::validation)?;
    }
    if let Some(description) = description {
        let trimmed = description.trim();
        meta.meta_description = (!trimmed.is_empty()).then(|| trimmed.to_string());
    }
    Ok(meta)
}

fn to_json<T: serde::Serialize>(value: &T) -> PageResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|err| PageError::internal(format!("Failed to encode JSON: {}", err)))
}

fn print_forest(nodes: &[PageNode], depth: usize) {
    for node in nodes {
        let home = if node.is_home { " (home)" } else { "" };
        println!(
            "{}{}\t/{}\t{}\t[{}]{}",
            "  ".repeat(depth),
            node.id,
            node.uri,
            node.title,
            node.status.as_str(),
            home
        );
        print_forest(&node.children, depth + 1);
    }
}

fn print_notices(notices: &[Notice]) {
    for notice in notices {
        let marker = match notice.level() {
            NoticeLevel::Success => "✅",
            NoticeLevel::Notice => "ℹ️",
            NoticeLevel::Error => "⚠️",
        };
        println!("{} {}", marker, notice);
    }
}
