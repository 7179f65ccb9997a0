use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tagshop::actions::{dispatch, load_listing_page, ActionSuccess, ListingCommand, ListingPage};
use tagshop::activation::{activate_from_link, ActivationState};
use tagshop::auth_store::{token_expiry, AuthStore, AUTH_STORAGE_KEY};
use tagshop::error_messages::UserFacingError;
use tagshop::guards::{AuthenticatedPage, PermissionGate, RedirectIfAuthenticated};
use tagshop::listing_state::ListingAction;
use tagshop::media::displayable_images;
use tagshop::models::{
    format_amount, AccountRole, ImageUpload, ItemUpdate, ListingId, MemberSignup, NewItem,
    PasswordResetConfirm, StoreQuery, StoreSignup, SupplyLine,
};
use tagshop::routes::Route;
use tagshop::services::{AuthService, StoreListingKind};
use tagshop::storage::{watch_key, FileStorage};
use tagshop::{Config, MarketplaceClient};

const STORAGE_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(name = "tagshop")]
#[command(about = "Buy, sell and manage tagged items in partner stores")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in with email and password
    Login {
        email: String,
        #[arg(short, long)]
        password: String,
    },

    /// Log out and forget the stored session
    Logout,

    /// Show the current session
    Status,

    /// Create a member or store account
    Signup {
        #[command(subcommand)]
        command: SignupCommands,
    },

    /// Activate an account from the emailed link
    Activate {
        /// Full activation link or its query string (`uuid=...&token=...`)
        link: String,
    },

    /// Reset a forgotten password
    PasswordReset {
        #[command(subcommand)]
        command: PasswordResetCommands,
    },

    /// View a tag and act on its listing
    Listing {
        #[command(subcommand)]
        command: ListingCommands,
    },

    /// Manage your items
    Items {
        #[command(subcommand)]
        command: ItemCommands,
    },

    /// Find partner stores
    Stores {
        #[command(subcommand)]
        command: StoreCommands,
    },

    /// Order store supplies
    Supplies {
        /// Lines as `<supply_id>:<quantity>`
        #[arg(required = true)]
        lines: Vec<SupplyLine>,
    },

    /// Payout account setup
    Payments {
        #[command(subcommand)]
        command: PaymentCommands,
    },
}

#[derive(Subcommand)]
enum SignupCommands {
    Member {
        email: String,
        #[arg(short, long)]
        password: String,
        #[arg(long)]
        password_confirm: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
    },
    Store {
        email: String,
        #[arg(short, long)]
        password: String,
        #[arg(long)]
        password_confirm: String,
        #[arg(long)]
        store_name: String,
        #[arg(long)]
        address: String,
        #[arg(long)]
        city: String,
        #[arg(long)]
        phone: Option<String>,
    },
}

#[derive(Subcommand)]
enum PasswordResetCommands {
    /// Email a reset link
    Request { email: String },
    /// Set a new password from the reset link
    Confirm {
        uid: String,
        token: String,
        #[arg(short, long)]
        password: String,
        #[arg(long)]
        password_confirm: String,
    },
}

#[derive(Subcommand)]
enum ListingCommands {
    /// Show a listing and the actions available to you
    Show { id: ListingId },
    /// Attach one of your items to a scanned tag
    Create {
        #[arg(long)]
        tag: String,
        #[arg(long)]
        item: u64,
    },
    /// Buy a listed item
    Checkout { id: ListingId },
    /// Take a listed item off sale
    Recall { id: ListingId },
    /// Collect a recalled item
    Collect {
        id: ListingId,
        #[arg(long)]
        pin: String,
    },
    /// Remove the tag from a recalled or abandoned item
    RemoveTag { id: ListingId },
    /// Confirm a sold item was handed over and remove its tag
    ConfirmPurchase { id: ListingId },
    /// Take a listing off the store (store accounts)
    Delist { id: ListingId },
    /// Move a listing to another tag (store accounts)
    ReplaceTag {
        id: ListingId,
        #[arg(long)]
        tag: String,
    },
    /// Listings in your store (store accounts)
    Mine {
        #[arg(value_enum, default_value_t = ListingKindArg::Active)]
        kind: ListingKindArg,
        #[arg(long)]
        page: Option<u32>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ListingKindArg {
    Active,
    Recalled,
    Abandoned,
    Sold,
}

impl From<ListingKindArg> for StoreListingKind {
    fn from(kind: ListingKindArg) -> Self {
        match kind {
            ListingKindArg::Active => StoreListingKind::Active,
            ListingKindArg::Recalled => StoreListingKind::Recalled,
            ListingKindArg::Abandoned => StoreListingKind::Abandoned,
            ListingKindArg::Sold => StoreListingKind::Sold,
        }
    }
}

#[derive(Subcommand)]
enum ItemCommands {
    List,
    Show {
        id: u64,
    },
    Create {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        condition: String,
        #[arg(long)]
        category: String,
        #[arg(long)]
        price: f64,
        /// Image files (jpg, png, webp, gif)
        #[arg(long = "image")]
        images: Vec<PathBuf>,
    },
    Update {
        id: u64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        price: Option<String>,
    },
    Delete {
        id: u64,
    },
}

#[derive(Subcommand)]
enum StoreCommands {
    Search {
        query: Option<String>,
        #[arg(long)]
        city: Option<String>,
        #[arg(long)]
        page: Option<u32>,
    },
    Show {
        id: u64,
    },
    /// Items on sale in a store
    Listings {
        id: u64,
    },
    /// Your own store profile (store accounts)
    Me,
}

#[derive(Subcommand)]
enum PaymentCommands {
    Status,
    /// Get the link to finish payout onboarding
    Onboard,
    /// Get the link to the payout dashboard
    Dashboard,
}

struct App {
    config: Config,
    client: MarketplaceClient,
    storage: Arc<FileStorage>,
    auth: Arc<AuthStore<AuthService>>,
}

impl App {
    async fn new(config: Config) -> Result<Self> {
        let storage = Arc::new(
            FileStorage::new(&config.state_dir)
                .with_context(|| format!("Cannot use state dir {}", config.state_dir.display()))?,
        );
        let client = MarketplaceClient::new(&config)?;
        let auth = Arc::new(AuthStore::new(client.auth.clone(), storage.clone()));

        client.http.set_bearer(auth.token()).await;
        client.spawn_bearer_sync(auth.subscribe());
        auth.clone().spawn_storage_sync(watch_key(
            storage.clone(),
            AUTH_STORAGE_KEY,
            STORAGE_POLL_INTERVAL,
        ));

        Ok(Self {
            config,
            client,
            storage,
            auth,
        })
    }

    async fn prepare_session(&self) {
        self.auth.initialize_auth().await;
        if let Err(e) = self.auth.ensure_fresh_token().await {
            tracing::warn!("Token refresh failed: {}", e);
        }
    }

    /// Blocks pages that need a signed-in account of one of `roles`.
    async fn require(&self, roles: &[AccountRole]) -> Result<()> {
        self.prepare_session().await;
        let mut state = self.auth.subscribe();
        let decision = AuthenticatedPage::new(roles.to_vec())
            .resolve(&mut state)
            .await;
        if decision.may_render() {
            return Ok(());
        }
        match decision.redirect {
            Some(ref redirect) => bail!("{} Redirecting to {}", decision.message(), redirect.route()),
            None => bail!("{}", decision.message()),
        }
    }

    /// Store-management commands check the persisted session only.
    fn require_store(&self) -> Result<()> {
        let decision = PermissionGate::new(vec![AccountRole::Store]).evaluate(self.storage.as_ref());
        if decision.may_render() {
            return Ok(());
        }
        match decision.redirect {
            Some(ref redirect) => bail!("{} Go to {}", decision.message(), redirect.route()),
            None => bail!("{}", decision.message()),
        }
    }
}

fn user_error(err: UserFacingError) -> anyhow::Error {
    for (field, messages) in &err.field_errors {
        for message in messages {
            eprintln!("  {}: {}", field, message);
        }
    }
    anyhow!(err.message)
}

fn print_listing(page: &ListingPage, config: &Config) {
    let Some(listing) = &page.listing else {
        println!("This tag has no item yet.");
        print_actions(page);
        return;
    };

    println!("Listing {} (tag {})", listing.id, listing.tag_id.as_deref().unwrap_or("-"));
    if let Some(store) = &listing.store_name {
        println!("  Store:     {}", store);
    }
    println!("  State:     {:?}", page.screen.branch);
    if let Some(details) = &listing.item_details {
        println!("  Item:      {}", details.name);
        if let Some(condition) = &details.condition {
            println!("  Condition: {}", condition);
        }
        println!("  Price:     {}", format_amount(details.listing_price));
        if let Some(deadline) = details.collection_deadline {
            println!("  Collect by {}", deadline.format("%Y-%m-%d %H:%M"));
        }
        let images = displayable_images(
            details.images.iter().map(|i| i.image.as_str()),
            &config.media_domains,
        );
        for image in images {
            println!("  Image:     {}", image);
        }
    }
    if let Some(relation) = page.relation {
        println!("  You are:   {:?}", relation);
    }
    print_actions(page);
}

fn print_actions(page: &ListingPage) {
    if page.screen.actions.is_empty() {
        return;
    }
    println!("Available:");
    for action in &page.screen.actions {
        println!("  - {}", action.label());
    }
}

async fn cmd_listing_action(
    app: &App,
    id: ListingId,
    action: ListingAction,
    pin: Option<&str>,
) -> Result<()> {
    app.prepare_session().await;
    let page = load_listing_page(&app.client, id).await.map_err(user_error)?;
    if !page.screen.allows(action) {
        bail!("\"{}\" is not available for this listing.", action.label());
    }
    let command = ListingCommand::for_action(action, &page.screen.branch, pin)
        .ok_or_else(|| anyhow!("\"{}\" is not available for this listing.", action.label()))?;
    run_command(app, id, command).await
}

async fn run_command(app: &App, id: ListingId, command: ListingCommand) -> Result<()> {
    match dispatch(&app.client, id, &command).await.map_err(user_error)? {
        ActionSuccess::Reload => {
            let page = load_listing_page(&app.client, id).await.map_err(user_error)?;
            print_listing(&page, &app.config);
        }
        ActionSuccess::Redirect(url) => println!("Continue to payment: {}", url),
    }
    Ok(())
}

async fn cmd_listing(app: &App, command: ListingCommands) -> Result<()> {
    match command {
        ListingCommands::Show { id } => {
            app.prepare_session().await;
            let page = load_listing_page(&app.client, id).await.map_err(user_error)?;
            print_listing(&page, &app.config);
        }
        ListingCommands::Create { tag, item } => {
            app.require(&[AccountRole::Member]).await?;
            let listing = app
                .client
                .listings
                .create_listing(&tag, item)
                .await
                .map_err(|e| user_error(e.into()))?;
            println!("Listed on tag {} as listing {}", tag.trim(), listing.id);
            println!("View it at {}", Route::Listing(listing.id));
        }
        ListingCommands::Checkout { id } => {
            cmd_listing_action(app, id, ListingAction::Checkout, None).await?
        }
        ListingCommands::Recall { id } => {
            cmd_listing_action(app, id, ListingAction::Recall, None).await?
        }
        ListingCommands::Collect { id, pin } => {
            cmd_listing_action(app, id, ListingAction::CollectWithPin, Some(&pin)).await?
        }
        ListingCommands::RemoveTag { id } => {
            cmd_listing_action(app, id, ListingAction::RemoveTag, None).await?
        }
        ListingCommands::ConfirmPurchase { id } => {
            cmd_listing_action(app, id, ListingAction::ConfirmPurchase, None).await?
        }
        ListingCommands::Delist { id } => {
            app.require_store()?;
            run_command(app, id, ListingCommand::Delist).await?
        }
        ListingCommands::ReplaceTag { id, tag } => {
            app.require_store()?;
            run_command(app, id, ListingCommand::ReplaceTag { new_tag_id: tag }).await?
        }
        ListingCommands::Mine { kind, page } => {
            app.require_store()?;
            let listings = app
                .client
                .listings
                .store_listings(kind.into(), page)
                .await
                .map_err(|e| user_error(e.into()))?;
            println!("{} listing(s)", listings.count);
            for listing in &listings.results {
                let name = listing
                    .item_details
                    .as_ref()
                    .map(|d| d.name.as_str())
                    .unwrap_or("(vacant)");
                println!(
                    "  #{:<6} tag {:<12} {}",
                    listing.id,
                    listing.tag_id.as_deref().unwrap_or("-"),
                    name
                );
            }
        }
    }
    Ok(())
}

async fn cmd_items(app: &App, command: ItemCommands) -> Result<()> {
    app.require(&[AccountRole::Member]).await?;
    let items = &app.client.items;
    match command {
        ItemCommands::List => {
            let page = items.list_items().await.map_err(|e| user_error(e.into()))?;
            for item in &page.results {
                println!("  #{:<6} {:<30} {}", item.id, item.name, format_amount(item.price));
            }
        }
        ItemCommands::Show { id } => {
            let item = items.get_item(id).await.map_err(|e| user_error(e.into()))?;
            println!("#{} {}", item.id, item.name);
            println!("  Price: {}", format_amount(item.price));
            if let Some(description) = &item.description {
                println!("  {}", description);
            }
        }
        ItemCommands::Create {
            name,
            description,
            condition,
            category,
            price,
            images,
        } => {
            let images = images
                .iter()
                .map(|path| ImageUpload::from_path(path))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| user_error(e.into()))?;
            let item = items
                .create_item(NewItem {
                    name,
                    description,
                    condition,
                    category,
                    price,
                    images,
                })
                .await
                .map_err(|e| user_error(e.into()))?;
            println!("Created item #{}", item.id);
        }
        ItemCommands::Update {
            id,
            name,
            description,
            price,
        } => {
            let update = ItemUpdate {
                name,
                description,
                price,
                ..ItemUpdate::default()
            };
            let item = items
                .update_item(id, &update)
                .await
                .map_err(|e| user_error(e.into()))?;
            println!("Updated item #{}", item.id);
        }
        ItemCommands::Delete { id } => {
            items.delete_item(id).await.map_err(|e| user_error(e.into()))?;
            println!("Deleted item #{}", id);
        }
    }
    Ok(())
}

async fn cmd_stores(app: &App, command: StoreCommands) -> Result<()> {
    let stores = &app.client.stores;
    match command {
        StoreCommands::Search { query, city, page } => {
            let results = stores
                .search_stores(&StoreQuery {
                    search: query,
                    city,
                    page,
                })
                .await
                .map_err(|e| user_error(e.into()))?;
            println!("{} store(s)", results.count);
            for store in &results.results {
                println!(
                    "  #{:<5} {:<30} {}",
                    store.id,
                    store.name,
                    store.city.as_deref().unwrap_or("")
                );
            }
        }
        StoreCommands::Show { id } => {
            let store = stores.get_store(id).await.map_err(|e| user_error(e.into()))?;
            println!("{}", store.name);
            if let Some(address) = &store.address {
                println!("  {}", address);
            }
            if let Some(hours) = &store.opening_hours {
                println!("  Open: {}", hours);
            }
            if let Some(rate) = store.commission_rate {
                println!("  Commission: {}%", format_amount(Some(rate)));
            }
            if let Some(map) = app
                .config
                .google_maps_api_key
                .as_deref()
                .and_then(|key| store.maps_embed_url(key))
            {
                println!("  Map: {}", map);
            }
        }
        StoreCommands::Listings { id } => {
            let listings = stores
                .store_listings(id)
                .await
                .map_err(|e| user_error(e.into()))?;
            for listing in &listings.results {
                let Some(details) = &listing.item_details else {
                    continue;
                };
                println!(
                    "  #{:<6} {:<30} {}",
                    listing.id,
                    details.name,
                    format_amount(details.listing_price)
                );
            }
        }
        StoreCommands::Me => {
            app.require_store()?;
            let store = stores.my_store().await.map_err(|e| user_error(e.into()))?;
            println!("#{} {}", store.id, store.name);
            if let Some(count) = store.active_listings {
                println!("  Active listings: {}", count);
            }
        }
    }
    Ok(())
}

async fn cmd_payments(app: &App, command: PaymentCommands) -> Result<()> {
    app.require(&[]).await?;
    let payments = &app.client.payments;
    match command {
        PaymentCommands::Status => {
            let status = payments.status().await.map_err(|e| user_error(e.into()))?;
            if status.is_ready() {
                println!("Payouts are set up.");
            } else if status.has_account {
                println!("Onboarding incomplete. Run `tagshop payments onboard`.");
            } else {
                println!("No payout account yet. Run `tagshop payments onboard`.");
            }
        }
        PaymentCommands::Onboard => {
            let link = payments
                .onboarding_link()
                .await
                .map_err(|e| user_error(e.into()))?;
            println!("Finish onboarding at {}", link.url);
        }
        PaymentCommands::Dashboard => {
            let link = payments
                .dashboard_link()
                .await
                .map_err(|e| user_error(e.into()))?;
            println!("Payout dashboard: {}", link.url);
        }
    }
    Ok(())
}

async fn cmd_login(app: &App, email: String, password: String) -> Result<()> {
    app.prepare_session().await;
    let mut state = app.auth.subscribe();
    let decision = RedirectIfAuthenticated.resolve(&mut state).await;
    if let Some(redirect) = decision.redirect {
        println!("Already logged in. Go to {}", redirect.route());
        return Ok(());
    }

    let role = app.auth.login(&email, &password).await.map_err(user_error)?;
    println!(
        "Logged in as {}. Go to {}",
        role.as_ref().map(AccountRole::as_str).unwrap_or("unknown role"),
        Route::dashboard_for(role.as_ref())
    );
    Ok(())
}

async fn cmd_status(app: &App) -> Result<()> {
    app.prepare_session().await;
    let state = app.auth.state();
    if !state.is_authenticated {
        println!("Not logged in ({:?}).", state.initialization_status);
        return Ok(());
    }
    println!(
        "Logged in as {}",
        state.role.as_ref().map(AccountRole::as_str).unwrap_or("unknown role")
    );
    if let Some(expiry) = state.token.as_deref().and_then(token_expiry) {
        println!("Access token valid until {}", expiry.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    Ok(())
}

async fn cmd_signup(app: &App, command: SignupCommands) -> Result<()> {
    let response = match command {
        SignupCommands::Member {
            email,
            password,
            password_confirm,
            first_name,
            last_name,
        } => {
            app.client
                .auth
                .signup_member(&MemberSignup {
                    email,
                    password,
                    password_confirm,
                    first_name,
                    last_name,
                })
                .await
        }
        SignupCommands::Store {
            email,
            password,
            password_confirm,
            store_name,
            address,
            city,
            phone,
        } => {
            app.client
                .auth
                .signup_store(&StoreSignup {
                    email,
                    password,
                    password_confirm,
                    store_name,
                    address,
                    city,
                    phone_number: phone,
                })
                .await
        }
    }
    .map_err(|e| user_error(e.into()))?;

    println!(
        "{}",
        response
            .message
            .as_deref()
            .unwrap_or("Account created. Check your email for the activation link.")
    );
    Ok(())
}

async fn cmd_password_reset(app: &App, command: PasswordResetCommands) -> Result<()> {
    let response = match command {
        PasswordResetCommands::Request { email } => {
            app.client.auth.request_password_reset(&email).await
        }
        PasswordResetCommands::Confirm {
            uid,
            token,
            password,
            password_confirm,
        } => {
            let form = PasswordResetConfirm {
                uid,
                token,
                new_password: password,
            };
            app.client
                .auth
                .confirm_password_reset(&form, &password_confirm)
                .await
        }
    }
    .map_err(|e| user_error(e.into()))?;

    println!("{}", response.message.as_deref().unwrap_or("Done."));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tagshop=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;
    let app = App::new(config).await?;

    match cli.command {
        Commands::Login { email, password } => cmd_login(&app, email, password).await,
        Commands::Logout => {
            if let Err(e) = app.auth.logout().await {
                tracing::warn!("Server logout failed: {}", e);
            }
            println!("Logged out.");
            Ok(())
        }
        Commands::Status => cmd_status(&app).await,
        Commands::Signup { command } => cmd_signup(&app, command).await,
        Commands::Activate { link } => match activate_from_link(&app.client.auth, &link).await {
            ActivationState::Activated(message) => {
                println!("{}", message);
                println!("Log in at {}", Route::Login);
                Ok(())
            }
            ActivationState::InvalidLink => bail!("Invalid activation link."),
            ActivationState::Failed(err) => Err(user_error(err)),
        },
        Commands::PasswordReset { command } => cmd_password_reset(&app, command).await,
        Commands::Listing { command } => cmd_listing(&app, command).await,
        Commands::Items { command } => cmd_items(&app, command).await,
        Commands::Stores { command } => cmd_stores(&app, command).await,
        Commands::Supplies { lines } => {
            app.require_store()?;
            let session = app
                .client
                .checkout
                .checkout_supplies(lines)
                .await
                .map_err(|e| user_error(e.into()))?;
            match session.checkout_url {
                Some(url) => println!("Continue to payment: {}", url),
                None => bail!("Checkout did not return a payment link."),
            }
            Ok(())
        }
        Commands::Payments { command } => cmd_payments(&app, command).await,
    }
}
