use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use larder_config::{CredentialStore, Settings};
use larder_pos::{HttpPosClient, PosApi};
use larder_sync::SyncEngine;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "larder")]
#[command(about = "Restaurant back-office inventory and order sync", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Order sync against the upstream POS
    Sync {
        #[command(subcommand)]
        cmd: SyncCmd,
    },

    /// Credential / token utilities
    Token {
        #[command(subcommand)]
        cmd: TokenCmd,
    },

    /// Menu catalog mirror
    Menu {
        #[command(subcommand)]
        cmd: MenuCmd,
    },

    /// Stock reports
    Stock {
        #[command(subcommand)]
        cmd: StockCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    /// Connectivity + schema presence check
    Status,
    /// Apply embedded SQL migrations
    Migrate,
}

#[derive(Subcommand)]
enum SyncCmd {
    /// Dry run: show what a commit would store and deduct
    Preview,
    /// Pull new orders, store them, and apply stock deductions
    Commit,
}

#[derive(Subcommand)]
enum TokenCmd {
    /// Request a fresh bearer token and persist it to the credential file
    Refresh,
}

#[derive(Subcommand)]
enum MenuCmd {
    /// Fetch the upstream catalog and refresh the local mirror
    Pull,
}

#[derive(Subcommand)]
enum StockCmd {
    /// All ingredients with current stock levels
    List,
    /// Sanity report: totals, negative stock, low stock
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => match cmd {
            DbCmd::Status => db_status().await,
            DbCmd::Migrate => db_migrate().await,
        },
        Commands::Sync { cmd } => match cmd {
            SyncCmd::Preview => sync_preview().await,
            SyncCmd::Commit => sync_commit().await,
        },
        Commands::Token { cmd } => match cmd {
            TokenCmd::Refresh => token_refresh().await,
        },
        Commands::Menu { cmd } => match cmd {
            MenuCmd::Pull => menu_pull().await,
        },
        Commands::Stock { cmd } => match cmd {
            StockCmd::List => stock_list().await,
            StockCmd::Check => stock_check().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

async fn open_pool() -> Result<sqlx::SqlitePool> {
    let settings = Settings::from_env()?;
    larder_db::connect(&settings.database_url).await
}

fn build_engine(pool: sqlx::SqlitePool) -> Result<SyncEngine> {
    let settings = Settings::from_env()?;
    let pos = HttpPosClient::new(settings.pos_base_url)
        .map_err(|e| anyhow!("pos client init failed: {e}"))?;
    let store = CredentialStore::new(&settings.credentials_path);
    Ok(SyncEngine::new(pool, Arc::new(pos), store))
}

// ---------------------------------------------------------------------------
// db
// ---------------------------------------------------------------------------

async fn db_status() -> Result<()> {
    let pool = open_pool().await?;
    let st = larder_db::status(&pool).await?;
    println!("ok: {}", st.ok);
    println!("schema present: {}", st.has_orders_table);
    Ok(())
}

async fn db_migrate() -> Result<()> {
    let pool = open_pool().await?;
    larder_db::migrate(&pool).await?;
    println!("migrations applied");
    Ok(())
}

// ---------------------------------------------------------------------------
// sync
// ---------------------------------------------------------------------------

async fn sync_preview() -> Result<()> {
    let pool = open_pool().await?;
    let engine = build_engine(pool)?;

    let preview = engine.preview().await.map_err(|e| anyhow!(e.to_string()))?;
    if preview.orders.is_empty() {
        println!("No new orders found");
        return Ok(());
    }

    println!("{} new order(s):", preview.orders.len());
    for order in &preview.orders {
        println!(
            "  {} (#{}) closed {} total {}",
            order.external_id,
            order.order_number.as_deref().unwrap_or("-"),
            order.closed_at.as_deref().unwrap_or("-"),
            order
                .total_amount
                .map(|t| format!("{t:.2}"))
                .unwrap_or_else(|| "-".to_string()),
        );
        for item in &order.items {
            println!("    {} x{}", item.name, item.quantity);
        }
    }

    println!("Would deduct:");
    for line in &preview.deductions {
        println!(
            "  {} {} {}",
            line.name,
            line.quantity,
            line.unit.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

async fn sync_commit() -> Result<()> {
    let pool = open_pool().await?;
    let engine = build_engine(pool)?;

    let summary = engine.commit().await.map_err(|e| anyhow!(e.to_string()))?;
    println!("{}", summary.message());
    println!("synced through {}", summary.window_end);
    Ok(())
}

// ---------------------------------------------------------------------------
// token
// ---------------------------------------------------------------------------

async fn token_refresh() -> Result<()> {
    let settings = Settings::from_env()?;
    let store = CredentialStore::new(&settings.credentials_path);
    let mut creds = store.load()?;
    if !creds.can_refresh() {
        return Err(anyhow!(
            "credential file {} is missing CLIENT_ID or CLIENT_SECRET",
            settings.credentials_path.display()
        ));
    }

    let pos = HttpPosClient::new(settings.pos_base_url)
        .map_err(|e| anyhow!("pos client init failed: {e}"))?;
    let grant = pos
        .login(&creds.client_id, &creds.client_secret)
        .await
        .map_err(|e| anyhow!("token refresh failed: {e}"))?;

    creds.access_token = Some(grant.access_token);
    store.save(&creds)?;

    match grant.expires_in {
        Some(secs) => println!("token refreshed and saved (expires in {secs}s)"),
        None => println!("token refreshed and saved"),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// menu
// ---------------------------------------------------------------------------

async fn menu_pull() -> Result<()> {
    let settings = Settings::from_env()?;
    let pool = open_pool().await?;

    let pos = Arc::new(
        HttpPosClient::new(settings.pos_base_url.clone())
            .map_err(|e| anyhow!("pos client init failed: {e}"))?,
    );
    let store = CredentialStore::new(&settings.credentials_path);
    let api: Arc<dyn PosApi> = pos.clone();
    let engine = SyncEngine::new(pool.clone(), api, store);

    let session = engine
        .establish_session()
        .await
        .map_err(|e| anyhow!(e.to_string()))?;
    let doc = pos
        .menu_catalog(&session)
        .await
        .map_err(|e| anyhow!("menu fetch failed: {e}"))?;

    let items = doc.flatten();
    let mut conn = pool.acquire().await?;
    for item in &items {
        larder_db::inventory::upsert_menu_item(
            &mut conn,
            &larder_db::inventory::MenuItem {
                item_guid: item.guid.clone(),
                item_name: item.name.clone(),
                menu: item.menu.clone(),
                group_path: Some(item.group_path.clone()),
            },
        )
        .await?;
    }
    println!("synced {} menu item(s)", items.len());
    Ok(())
}

// ---------------------------------------------------------------------------
// stock
// ---------------------------------------------------------------------------

async fn stock_list() -> Result<()> {
    let pool = open_pool().await?;
    let items = larder_db::inventory::list_ingredients(&pool).await?;
    if items.is_empty() {
        println!("no ingredients");
        return Ok(());
    }
    for item in items {
        println!(
            "{:<24} {:>10.2} {:<6} (threshold {:.1})",
            item.name,
            item.current_stock,
            item.unit.as_deref().unwrap_or(""),
            item.threshold,
        );
    }
    Ok(())
}

async fn stock_check() -> Result<()> {
    let pool = open_pool().await?;

    let items = larder_db::inventory::list_ingredients(&pool).await?;
    let recipes = larder_db::inventory::all_recipes(&pool).await?;
    let stats = larder_db::orders::order_stats(&pool).await?;

    println!("ingredients: {}", items.len());
    println!("menu items with recipes: {}", recipes.len());
    println!("orders stored: {} (revenue {:.2})", stats.total_count, stats.revenue);

    let negative: Vec<_> = items.iter().filter(|i| i.current_stock < 0.0).collect();
    if negative.is_empty() {
        println!("negative stock: none");
    } else {
        println!("negative stock:");
        for item in negative {
            println!(
                "  {}: {} {}",
                item.name,
                item.current_stock,
                item.unit.as_deref().unwrap_or("")
            );
        }
    }

    let low = larder_db::ledger::low_stock(&pool).await?;
    if !low.is_empty() {
        println!("at or below reorder threshold:");
        for item in low {
            println!(
                "  {}: {} {} (threshold {})",
                item.name,
                item.current_stock,
                item.unit.as_deref().unwrap_or(""),
                item.threshold
            );
        }
    }

    Ok(())
}
