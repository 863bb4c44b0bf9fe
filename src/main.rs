//! Binary entrypoint for the Tavern RPG CLI.
//!
//! Commands:
//! - `init` - write a starter `tavern.toml` and create the database
//! - `status` - print account, identity and room counts
//! - `signup <email>` / `characters <email>` / `create-character <email> ...`
//! - `rooms <admin-email>` - list open rooms (admin)
//! - `watch <email> <code>` - join a room and print roster changes until it closes
//! - `grant-xp`, `award-game`, `set-world-level` - admin panel actions
//! - `promote <email>` - set the admin flag directly in the database
//! - `rules` - print house rules, classes and world levels
//!
//! See the library crate docs for module-level details: `tavernrpg::`.
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use tavernrpg::config::Config;
use tavernrpg::game::accounts::{find_account_by_email, set_admin_flag};
use tavernrpg::game::catalog::{self, CLASSES, HOUSE_RULES, PARTY_GAMES, WORLD_LEVELS};
use tavernrpg::game::progression::xp_to_next_level;
use tavernrpg::game::types::{ROOMS, USERS};
use tavernrpg::game::{
    AccountService, AdminConsole, AuthSession, CharacterStore, Room, RoomSession, SessionEvent,
    SlotIndex,
};
use tavernrpg::gateway::SledStore;
use tavernrpg::identity::LocalIdentity;

#[derive(Parser)]
#[command(name = "tavernrpg")]
#[command(about = "Room, roster and character core of a party RPG")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "tavern.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration and create the database
    Init,
    /// Show account and room counts
    Status,
    /// Register a new account
    Signup { email: String },
    /// List the character slots of an account
    Characters { email: String },
    /// Create a character in a slot (0-4)
    CreateCharacter {
        email: String,
        slot: usize,
        name: String,
        /// barbarian, mage, marksman or paladin
        class: String,
    },
    /// List open rooms (admin)
    Rooms { admin: String },
    /// Join a room and follow its roster until it closes or Ctrl-C
    Watch {
        email: String,
        code: String,
        #[arg(short, long, default_value_t = 0)]
        slot: usize,
    },
    /// Grant (or with a negative amount, revoke) xp (admin)
    GrantXp {
        admin: String,
        player: String,
        slot: usize,
        #[arg(allow_negative_numbers = true)]
        amount: i64,
    },
    /// Credit the rewards of a party game (admin)
    AwardGame {
        admin: String,
        player: String,
        slot: usize,
        game: String,
    },
    /// Move a player in a room to another world level (admin)
    SetWorldLevel {
        admin: String,
        code: String,
        player: String,
        level: u32,
    },
    /// Set the admin flag of an account directly in the database
    Promote { email: String },
    /// Print house rules, classes, party games and world levels
    Rules,
}

/// Store, identity provider and account service opened from one config.
struct App {
    config: Config,
    store: Arc<SledStore>,
    identity: Arc<LocalIdentity>,
    accounts: AccountService<SledStore, LocalIdentity>,
}

impl App {
    fn open(config: Config) -> Result<Self> {
        let store = Arc::new(SledStore::open(config.storage.database_path())?);
        let identity = Arc::new(LocalIdentity::open(store.db(), &config.auth)?);
        let accounts = AccountService::new(store.clone(), identity.clone(), config.game.clone());
        Ok(Self {
            config,
            store,
            identity,
            accounts,
        })
    }

    async fn sign_in(&self, email: &str) -> Result<AuthSession> {
        let password = rpassword::prompt_password(format!("Password for {}: ", email))?;
        self.accounts
            .sign_in(email, &password)
            .await
            .map_err(|e| anyhow!(e.user_message()))
    }

    async fn admin(&self, email: &str) -> Result<AdminConsole<SledStore>> {
        let session = self.sign_in(email).await?;
        AdminConsole::new(self.store.clone(), session, self.config.game.clone())
            .map_err(|e| anyhow!(e.user_message()))
    }

    async fn room_by_code(&self, console: &AdminConsole<SledStore>, code: &str) -> Result<Room> {
        let code = code.to_ascii_uppercase();
        console
            .list_rooms()
            .await
            .map_err(|e| anyhow!(e.user_message()))?
            .into_iter()
            .find(|room| room.code.as_str() == code)
            .ok_or_else(|| anyhow!("Room {} not found", code))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let command = match cli.command {
        Commands::Init => return init(&cli.config, cli.verbose).await,
        other => other,
    };

    let config = Config::load(&cli.config).await?;
    init_logging(Some(&config), cli.verbose);

    match command {
        Commands::Init => {}
        Commands::Rules => print_rules(),
        Commands::Status => {
            let app = App::open(config)?;
            println!("{}", app.config.game.name);
            println!("  identities: {}", app.identity.count());
            println!("  accounts:   {}", app.store.count(USERS)?);
            println!("  rooms:      {}", app.store.count(ROOMS)?);
            println!("  collections: {}", app.store.collection_names().join(", "));
        }
        Commands::Signup { email } => {
            let app = App::open(config)?;
            let password = rpassword::prompt_password("New password: ")?;
            let confirm = rpassword::prompt_password("Confirm password: ")?;
            if password != confirm {
                println!("Error: passwords do not match.");
                return Ok(());
            }
            match app.accounts.sign_up(&email, &password).await {
                Ok(session) => println!(
                    "Account {} created ({:?}).",
                    session.account_id, session.role
                ),
                Err(e) => println!("Error: {}", e.user_message()),
            }
        }
        Commands::Characters { email } => {
            let app = App::open(config)?;
            let session = app.sign_in(&email).await?;
            let characters = CharacterStore::new(app.store.clone(), app.config.game.clone());
            let slots = characters
                .list_characters(&session.account_id)
                .await
                .map_err(|e| anyhow!(e.user_message()))?;
            for (slot, entry) in slots.iter().enumerate() {
                match entry {
                    Some(c) => println!(
                        "[{}] {} the {} - level {}, {} xp ({} to next), {} coins, {} items",
                        slot,
                        c.name,
                        c.class_ref,
                        c.level(),
                        c.xp,
                        xp_to_next_level(c.xp),
                        c.coins,
                        c.inventory.len()
                    ),
                    None => println!("[{}] (empty)", slot),
                }
            }
        }
        Commands::CreateCharacter {
            email,
            slot,
            name,
            class,
        } => {
            let app = App::open(config)?;
            let slot = SlotIndex::new(slot).map_err(|e| anyhow!(e.user_message()))?;
            let session = app.sign_in(&email).await?;
            let characters = CharacterStore::new(app.store.clone(), app.config.game.clone());
            match characters
                .create_character(&session.account_id, slot, &name, &class)
                .await
            {
                Ok(c) => println!("Created {} the {} in slot {}.", c.name, c.class_ref, slot),
                Err(e) => println!("Error: {}", e.user_message()),
            }
        }
        Commands::Rooms { admin } => {
            let app = App::open(config)?;
            let console = app.admin(&admin).await?;
            let rooms = console
                .list_rooms()
                .await
                .map_err(|e| anyhow!(e.user_message()))?;
            if rooms.is_empty() {
                println!("No open rooms.");
            }
            for room in rooms {
                println!("{} {} ({} players)", room.code, room.name, room.players.len());
                for p in &room.players {
                    println!(
                        "    {} - world level {}",
                        p.character.name, p.world_level
                    );
                }
            }
        }
        Commands::Watch { email, code, slot } => {
            let app = App::open(config)?;
            let slot = SlotIndex::new(slot).map_err(|e| anyhow!(e.user_message()))?;
            let session = app.sign_in(&email).await?;
            let mut room_session = RoomSession::open(app.store.clone(), session, slot)
                .await
                .map_err(|e| anyhow!(e.user_message()))?;
            let room = room_session
                .join_room(&code)
                .await
                .map_err(|e| anyhow!(e.user_message()))?
                .clone();
            println!("Joined '{}' ({}). Ctrl-C to leave.", room.name, room.code);
            print_roster(&room);
            loop {
                tokio::select! {
                    event = room_session.next_event() => match event {
                        Some(SessionEvent::RosterChanged(room)) => print_roster(&room),
                        Some(SessionEvent::RoomClosed) => {
                            println!("The room was closed.");
                            break;
                        }
                        None => break,
                    },
                    _ = tokio::signal::ctrl_c() => {
                        if let Err(e) = room_session.leave_room().await {
                            warn!("leaving room failed: {}", e);
                        }
                        println!("Left the room.");
                        break;
                    }
                }
            }
        }
        Commands::GrantXp {
            admin,
            player,
            slot,
            amount,
        } => {
            let app = App::open(config)?;
            let slot = SlotIndex::new(slot).map_err(|e| anyhow!(e.user_message()))?;
            let console = app.admin(&admin).await?;
            let (player_id, _) = find_account_by_email(app.store.as_ref(), &player)
                .await
                .map_err(|e| anyhow!(e.user_message()))?;
            match console.grant_experience(&player_id, slot, amount).await {
                Ok(c) => println!("{} now has {} xp (level {}).", c.name, c.xp, c.level()),
                Err(e) => println!("Error: {}", e.user_message()),
            }
        }
        Commands::AwardGame {
            admin,
            player,
            slot,
            game,
        } => {
            let app = App::open(config)?;
            let slot = SlotIndex::new(slot).map_err(|e| anyhow!(e.user_message()))?;
            let console = app.admin(&admin).await?;
            let (player_id, _) = find_account_by_email(app.store.as_ref(), &player)
                .await
                .map_err(|e| anyhow!(e.user_message()))?;
            match console.award_game(&player_id, slot, &game).await {
                Ok(c) => println!("{} now has {} xp and {} coins.", c.name, c.xp, c.coins),
                Err(e) => println!("Error: {}", e.user_message()),
            }
        }
        Commands::SetWorldLevel {
            admin,
            code,
            player,
            level,
        } => {
            let app = App::open(config)?;
            let console = app.admin(&admin).await?;
            let room = app.room_by_code(&console, &code).await?;
            let (player_id, _) = find_account_by_email(app.store.as_ref(), &player)
                .await
                .map_err(|e| anyhow!(e.user_message()))?;
            match console.set_world_level(&room.id, &player_id, level).await {
                Ok(_) => {
                    println!("{} moved to world level {} in {}.", player, level, room.code);
                    if let Ok(challenge) = catalog::world_level(level) {
                        println!("  {} {}: {}", challenge.icon, challenge.name, challenge.task);
                    }
                }
                Err(e) => println!("Error: {}", e.user_message()),
            }
        }
        Commands::Promote { email } => {
            let app = App::open(config)?;
            let (account_id, _) = find_account_by_email(app.store.as_ref(), &email)
                .await
                .map_err(|e| anyhow!(e.user_message()))?;
            set_admin_flag(app.store.as_ref(), &account_id, true)
                .await
                .map_err(|e| anyhow!(e.user_message()))?;
            println!("{} is now an admin.", email);
        }
    }

    Ok(())
}

async fn init(path: &str, verbosity: u8) -> Result<()> {
    init_logging(None, verbosity);
    info!("Initializing new Tavern RPG configuration");
    let config = Config::default();
    Config::create_default(path).await?;
    tokio::fs::create_dir_all(&config.storage.data_dir).await?;
    let db_path = config.storage.database_path();
    App::open(config)?;
    info!(
        "Configuration file created at {}, database at {}",
        path,
        db_path.display()
    );
    Ok(())
}

fn print_roster(room: &Room) {
    println!("-- {} ({}) --", room.name, room.code);
    for p in &room.players {
        let crown = if p.uid == room.created_by { " (host)" } else { "" };
        println!(
            "  {}{} - level {}, world level {}",
            p.character.name,
            crown,
            p.character.level(),
            p.world_level
        );
    }
}

fn print_rules() {
    println!("House rules:");
    for rule in HOUSE_RULES {
        println!("  - {}", rule);
    }
    println!("\nClasses:");
    for c in CLASSES {
        println!(
            "  {} {:<10} tolerance {:>2}, stomach {:>2}, energy {:>2}  {}",
            c.sprite,
            c.name,
            c.base_stats.alcohol_tolerance,
            c.base_stats.stomach_capacity,
            c.base_stats.energy,
            c.description
        );
    }
    println!("\nParty games:");
    for g in PARTY_GAMES {
        println!("  {:<14} {:>3} xp {:>3} coins  {}", g.id, g.xp_reward, g.coin_reward, g.description);
    }
    println!("\nWorld levels:");
    for w in WORLD_LEVELS {
        println!("  {} {}. {} - {}", w.icon, w.id, w.name, w.task);
    }
}

fn log_line(record: &log::Record) -> String {
    format!(
        "{} [{}] {}",
        chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
        record.level(),
        record.args()
    )
}

fn init_logging(config: Option<&Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    let configured = config
        .and_then(|c| c.logging.level.parse::<log::LevelFilter>().ok())
        .unwrap_or(log::LevelFilter::Info);
    // -v / -vv only ever raise the configured level
    let level = match verbosity {
        0 => configured,
        1 => configured.max(log::LevelFilter::Debug),
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(level);

    let sinks = LogSinks {
        file: config
            .and_then(|c| c.logging.file.as_ref())
            .and_then(|path| open_append(path).ok())
            .map(std::sync::Mutex::new),
        security_file: config.and_then(|c| c.logging.security_file.clone()),
        // Mirror file output to the console only when someone is watching it.
        mirror: atty::is(atty::Stream::Stdout),
    };
    builder.format(move |fmt, record| {
        let line = log_line(record);
        if sinks.write(record.target(), &line) {
            writeln!(fmt, "{}", line)
        } else {
            Ok(())
        }
    });
    let _ = builder.try_init();
}

fn open_append(path: &str) -> std::io::Result<std::fs::File> {
    std::fs::OpenOptions::new().create(true).append(true).open(path)
}

/// Where formatted log lines go besides the console.
struct LogSinks {
    file: Option<std::sync::Mutex<std::fs::File>>,
    security_file: Option<String>,
    mirror: bool,
}

impl LogSinks {
    /// Write `line` to the configured files. Returns whether it should also
    /// reach the console.
    fn write(&self, target: &str, line: &str) -> bool {
        use std::io::Write;
        if target == "security" {
            if let Some(path) = &self.security_file {
                if let Ok(mut sf) = open_append(path) {
                    let _ = writeln!(sf, "{}", line);
                }
            }
        }
        match &self.file {
            Some(file) => {
                if let Ok(mut guard) = file.lock() {
                    let _ = writeln!(guard, "{}", line);
                }
                self.mirror
            }
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn security_lines_reach_their_file_without_a_main_log_file() {
        let dir = tempdir().unwrap();
        let sec = dir.path().join("security.log");
        let sinks = LogSinks {
            file: None,
            security_file: Some(sec.to_string_lossy().to_string()),
            mirror: false,
        };
        assert!(sinks.write("security", "lockout for x"));
        assert!(sinks.write("tavernrpg::game", "room opened"));
        let written = std::fs::read_to_string(&sec).unwrap();
        assert_eq!(written, "lockout for x\n");
    }

    #[test]
    fn main_file_gets_every_line_and_console_follows_mirror() {
        let dir = tempdir().unwrap();
        let main_log = dir.path().join("tavern.log");
        let sinks = LogSinks {
            file: Some(std::sync::Mutex::new(
                open_append(&main_log.to_string_lossy()).unwrap(),
            )),
            security_file: None,
            mirror: false,
        };
        assert!(!sinks.write("security", "grant"));
        assert!(!sinks.write("tavernrpg", "hello"));
        let written = std::fs::read_to_string(&main_log).unwrap();
        assert_eq!(written.lines().count(), 2);
    }
}
