use std::error::Error;

use bizu_core::{
    ArticleStore, AuditStatus, Bizu, BizuError, BizuId, BizuPatch, FetchOutcome, FetchParams,
    LikeStore, NewBizu, TtlCache,
};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, warn};

#[derive(Parser)]
#[command(name = "bizu")]
#[command(about = "Browse and curate the Bizu Desk knowledge base")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Overrides the backend URL from the config file
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List bizus, newest first
    List {
        #[arg(short, long)]
        query: Option<String>,
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show one bizu and count the view
    Show { id: BizuId },
    Create(DraftArgs),
    Edit {
        id: BizuId,
        #[command(flatten)]
        fields: PatchArgs,
    },
    Delete { id: BizuId },
    /// Like the bizu, or remove the like if already given
    Like { id: BizuId },
    /// Manage the local list cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// Drop every cached list
    Clear,
    /// Drop only expired or unreadable entries
    Sweep,
}

#[derive(Args)]
pub struct DraftArgs {
    #[arg(long)]
    pub title: String,
    /// Comma-separated when the bizu fits several categories
    #[arg(long)]
    pub category: String,
    #[arg(long)]
    pub content: String,
    #[arg(long = "keyword")]
    pub keywords: Vec<String>,
    #[arg(long)]
    pub image_url: Option<String>,
}

#[derive(Args)]
pub struct PatchArgs {
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long)]
    pub content: Option<String>,
    #[arg(long = "keyword")]
    pub keywords: Option<Vec<String>>,
    #[arg(long)]
    pub image_url: Option<String>,
}

pub struct Context {
    pub articles: ArticleStore,
    pub likes: LikeStore,
    pub cache: TtlCache,
    pub default_limit: usize,
}

pub async fn run(command: Command, ctx: &Context) -> Result<(), Box<dyn Error>> {
    match command {
        Command::List { query, limit, json } => {
            let mut params = FetchParams::new().limit(limit.unwrap_or(ctx.default_limit));
            params.query = query;
            let outcome = ctx.articles.fetch(params).await;
            debug!(?outcome, "list fetched");
            if outcome == FetchOutcome::Failed {
                let message = ctx.articles.error().await.unwrap_or_default();
                return Err(format!("could not load bizus: {message}").into());
            }
            let bizus = ctx.articles.bizus().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&bizus)?);
            } else {
                print_table(&bizus);
            }
        }
        Command::Show { id } => {
            let bizu = ctx.articles.find(id).await?;
            let views = ctx.articles.record_view(id).await.unwrap_or(bizu.views_count);
            print_detail(&bizu, views, ctx.articles.can_edit(&bizu));
        }
        Command::Create(draft) => {
            let new = NewBizu {
                title: draft.title,
                category: draft.category,
                keywords: draft.keywords,
                content: draft.content,
                image_url: draft.image_url,
                author_id: None,
            };
            let created = ctx.articles.create(new).await?;
            println!("created {} ({})", created.title, created.id);
        }
        Command::Edit { id, fields } => {
            let patch = BizuPatch {
                title: fields.title,
                category: fields.category,
                keywords: fields.keywords,
                content: fields.content,
                image_url: fields.image_url,
            };
            if patch.is_empty() {
                return Err("nothing to change, pass at least one field".into());
            }
            let receipt = ctx.articles.update(id, patch).await?;
            println!("updated {} ({})", receipt.bizu.title, receipt.bizu.id);
            if let AuditStatus::Failed(e) = receipt.audit {
                warn!(error = %e, "edit saved but the audit record was not");
                eprintln!("warning: edit saved, audit log failed: {e}");
            }
        }
        Command::Delete { id } => {
            ctx.articles.delete(id).await?;
            println!("deleted {id}");
        }
        Command::Like { id } => {
            let bizu = ctx.articles.find(id).await?;
            ctx.likes.seed(bizu.id, bizu.is_liked, bizu.likes_count).await;
            match ctx.likes.toggle_like(id).await {
                Ok(state) => {
                    let verb = if state.liked { "liked" } else { "unliked" };
                    println!("{verb} {} ({} likes)", bizu.title, state.count);
                }
                Err(e @ BizuError::Unauthenticated(_)) => {
                    return Err(format!("{e}; set BIZU_ACCESS_TOKEN").into())
                }
                Err(e) => return Err(e.into()),
            }
        }
        Command::Cache { action } => match action {
            CacheAction::Clear => {
                ctx.cache.clear().await;
                println!("cache cleared");
            }
            CacheAction::Sweep => {
                let removed = ctx.cache.clear_expired().await;
                println!("removed {removed} stale cache entries");
            }
        },
    }
    Ok(())
}

fn print_table(bizus: &[Bizu]) {
    if bizus.is_empty() {
        println!("no bizus found");
        return;
    }
    for b in bizus {
        let heart = if b.is_liked { "♥" } else { " " };
        println!(
            "{}  {} {:>4}  {:<20}  {}",
            b.id,
            heart,
            b.likes_count,
            b.categories().join(", "),
            b.title
        );
    }
}

fn print_detail(bizu: &Bizu, views: u64, editable: bool) {
    println!("{}", bizu.title);
    println!("category: {}", bizu.categories().join(", "));
    if !bizu.keywords.is_empty() {
        println!("keywords: {}", bizu.keywords.join(", "));
    }
    println!(
        "likes: {}  views: {}  updated: {}",
        bizu.likes_count,
        views,
        bizu.updated_at.format("%Y-%m-%d %H:%M")
    );
    if let Some(url) = &bizu.image_url {
        println!("image: {url}");
    }
    if editable {
        println!("(you can edit this bizu)");
    }
    println!();
    println!("{}", bizu.content);
}
