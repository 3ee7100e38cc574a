//! The league context: one explicit object that owns the sync services and
//! the in-memory view of every collection.
//!
//! RULES:
//!   - `LeagueState` is read-only from outside; every mutation is a
//!     `LeagueCommand` passed to `execute()`.
//!   - State is updated only after the service call succeeded locally.
//!   - Tournament team lists follow the club names of non-finished
//!     tournaments; they are re-derived after every club mutation.

use crate::{
    bonus::{apply_weekly_victory_bonus, BonusReport},
    clock::{Clock, SystemClock},
    command::LeagueCommand,
    config::LigaConfig,
    economics::{adjust_all_player_market_values, adjust_all_player_salaries, AdjustmentSummary},
    error::{LigaError, LigaResult},
    fixtures::generate_round_robin,
    ids::IdGenerator,
    model::{roster, Club, Match, MatchStatus, Player, Post, Tournament, TournamentStatus},
    offers::{validate_offer_basics, OfferVerdict},
    remote::{PostgrestClient, RemoteBackend},
    seed,
    standings::{compute_standings, StandingRow},
    store::LocalStore,
    sync::{label_matches, EntitySync, FlushReport, LabeledMatch, SyncContext, SyncEntity},
    types::{EntityId, Money},
};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread::ScopedJoinHandle;

#[derive(Debug, Clone, Default)]
pub struct LeagueState {
    pub clubs:       Vec<Club>,
    pub players:     Vec<Player>,
    pub tournaments: Vec<Tournament>,
    pub matches:     Vec<Match>,
    pub posts:       Vec<Post>,
    /// Set once `load()` has run.
    pub loaded:      bool,
}

/// What a command produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "data", rename_all = "snake_case")]
pub enum CommandOutcome {
    Club(Club),
    Player(Player),
    Tournament(Tournament),
    Match(Match),
    Post(Post),
    Deleted { removed: bool, cascaded: usize },
    Fixtures(Vec<Match>),
    Adjusted(AdjustmentSummary),
    Bonus(Option<BonusReport>),
    Flushed(FlushReport),
}

pub struct League {
    config:      LigaConfig,
    ctx:         SyncContext,
    players:     EntitySync<Player>,
    clubs:       EntitySync<Club>,
    tournaments: EntitySync<Tournament>,
    matches:     EntitySync<Match>,
    posts:       EntitySync<Post>,
    state:       LeagueState,
}

impl League {
    /// Open the store at `config.db_path` and, when the remote flag is on,
    /// connect to the configured backend.
    pub fn open(config: LigaConfig) -> LigaResult<Self> {
        let store = Arc::new(LocalStore::open(&config.db_path)?);
        let remote: Option<Arc<dyn RemoteBackend>> = match config.active_remote() {
            Some(rc) => Some(Arc::new(PostgrestClient::new(rc)?) as Arc<dyn RemoteBackend>),
            None => {
                if config.use_remote {
                    log::warn!("remote sync enabled but no remote configured; running local only");
                }
                None
            }
        };
        Ok(Self::with_backends(
            config,
            store,
            remote,
            Arc::new(SystemClock),
            Arc::new(IdGenerator::from_entropy()),
        ))
    }

    pub fn with_backends(
        config: LigaConfig,
        store: Arc<LocalStore>,
        remote: Option<Arc<dyn RemoteBackend>>,
        clock: Arc<dyn Clock>,
        ids: Arc<IdGenerator>,
    ) -> Self {
        let ctx = SyncContext::new(store, remote, clock, ids, config.sync.clone());
        Self {
            players: EntitySync::new(ctx.clone()),
            clubs: EntitySync::new(ctx.clone()),
            tournaments: EntitySync::new(ctx.clone()),
            matches: EntitySync::new(ctx.clone()),
            posts: EntitySync::new(ctx.clone()),
            ctx,
            config,
            state: LeagueState::default(),
        }
    }

    /// In-memory store, seeded ids, test config. Pass a `MemoryRemote` to
    /// exercise the sync path.
    pub fn build_test(remote: Option<Arc<dyn RemoteBackend>>, clock: Arc<dyn Clock>) -> LigaResult<Self> {
        let mut config = LigaConfig::default_test();
        config.use_remote = remote.is_some();
        let store = Arc::new(LocalStore::in_memory()?);
        Ok(Self::with_backends(
            config,
            store,
            remote,
            clock,
            Arc::new(IdGenerator::seeded(42)),
        ))
    }

    pub fn state(&self) -> &LeagueState {
        &self.state
    }

    pub fn config(&self) -> &LigaConfig {
        &self.config
    }

    pub fn context(&self) -> &SyncContext {
        &self.ctx
    }

    // ── Loading ────────────────────────────────────────────────

    /// Fill the state from every collection. Remote-backed collections are
    /// listed in parallel; empty or failing ones fall back to seed data.
    pub fn load(&mut self) -> LigaResult<()> {
        let (clubs, players, tournaments, matches) = std::thread::scope(|s| {
            let clubs = s.spawn(|| self.clubs.list());
            let players = s.spawn(|| self.players.list());
            let tournaments = s.spawn(|| self.tournaments.list());
            let matches = s.spawn(|| self.matches.list());
            (join(clubs), join(players), join(tournaments), join(matches))
        });

        self.state.clubs = or_seed(&self.clubs, clubs, seed::clubs);
        self.state.players = or_seed(&self.players, players, seed::players);
        self.state.tournaments = or_seed(&self.tournaments, tournaments, seed::tournaments);
        self.state.matches = match matches {
            Ok(m) => m,
            Err(e) => {
                log::warn!("matches: load failed, starting empty: {e}");
                Vec::new()
            }
        };
        self.state.posts = or_seed(&self.posts, self.posts.list_local(), seed::posts);

        let migrated = self.migrate_legacy_matches()?;
        self.state.loaded = true;
        log::info!(
            "league loaded ({}): {} clubs, {} players, {} tournaments, {} matches ({} migrated), {} posts",
            if self.ctx.remote_enabled() { "remote sync on" } else { "local only" },
            self.state.clubs.len(),
            self.state.players.len(),
            self.state.tournaments.len(),
            self.state.matches.len(),
            migrated,
            self.state.posts.len()
        );
        Ok(())
    }

    /// Move matches embedded in tournament documents into the matches
    /// collection. Ids already present there are left alone.
    fn migrate_legacy_matches(&mut self) -> LigaResult<usize> {
        let mut known: HashSet<EntityId> = self.state.matches.iter().map(|m| m.id.clone()).collect();
        let mut moved = Vec::new();
        let mut touched = Vec::new();

        for t in &mut self.state.tournaments {
            if t.legacy_matches.is_empty() {
                continue;
            }
            for mut m in std::mem::take(&mut t.legacy_matches) {
                if m.tournament_id.trim().is_empty() {
                    m.tournament_id = t.id.clone();
                }
                if m.id.trim().is_empty() {
                    m.id = format!("{}-r{}-{}-{}", t.id, m.round, m.home_team, m.away_team);
                }
                if known.insert(m.id.clone()) {
                    moved.push(m);
                }
            }
            touched.push(t.clone());
        }

        if touched.is_empty() {
            return Ok(0);
        }
        let moved = self.matches.upsert_local_and_remote(moved)?;
        // Rewriting drops the embedded array locally and clears the remote column.
        self.tournaments.update_many(&touched)?;
        let count = moved.len();
        self.state.matches.extend(moved);
        Ok(count)
    }

    // ── Commands ───────────────────────────────────────────────

    pub fn execute(&mut self, command: LeagueCommand) -> LigaResult<CommandOutcome> {
        log::debug!("execute: {command:?}");
        match command {
            LeagueCommand::CreateClub { club } => {
                let club = self.clubs.create(club)?;
                self.state.clubs.push(club.clone());
                self.sync_tournament_teams()?;
                Ok(CommandOutcome::Club(club))
            }
            LeagueCommand::UpdateClub { club } => {
                let idx = position(&self.state.clubs, &club.id)?;
                let club = self.clubs.update(club)?;
                self.state.clubs[idx] = club.clone();
                self.sync_tournament_teams()?;
                Ok(CommandOutcome::Club(club))
            }
            LeagueCommand::DeleteClub { club_id } => {
                let removed = self.clubs.delete(&club_id)?;
                self.state.clubs.retain(|c| c.id != club_id);
                self.sync_tournament_teams()?;
                Ok(CommandOutcome::Deleted { removed, cascaded: 0 })
            }

            LeagueCommand::CreatePlayer { player } => {
                let player = self.players.create(player)?;
                self.state.players.push(player.clone());
                Ok(CommandOutcome::Player(player))
            }
            LeagueCommand::UpdatePlayer { player } => {
                let idx = position(&self.state.players, &player.id)?;
                let player = self.players.update(player)?;
                self.state.players[idx] = player.clone();
                Ok(CommandOutcome::Player(player))
            }
            LeagueCommand::DeletePlayer { player_id } => {
                let removed = self.players.delete(&player_id)?;
                self.state.players.retain(|p| p.id != player_id);
                Ok(CommandOutcome::Deleted { removed, cascaded: 0 })
            }

            LeagueCommand::CreateTournament { mut tournament } => {
                if tournament.teams.is_empty() {
                    tournament.teams = self.club_names();
                }
                let tournament = self.tournaments.create(tournament)?;
                self.state.tournaments.push(tournament.clone());
                Ok(CommandOutcome::Tournament(tournament))
            }
            LeagueCommand::UpdateTournament { tournament } => {
                let idx = position(&self.state.tournaments, &tournament.id)?;
                let tournament = self.tournaments.update(tournament)?;
                self.state.tournaments[idx] = tournament.clone();
                Ok(CommandOutcome::Tournament(tournament))
            }
            LeagueCommand::DeleteTournament { tournament_id } => {
                let removed = self.tournaments.delete(&tournament_id)?;
                let cascaded = self.matches.delete_where("tournamentId", &tournament_id)?;
                self.state.tournaments.retain(|t| t.id != tournament_id);
                self.state.matches.retain(|m| m.tournament_id != tournament_id);
                Ok(CommandOutcome::Deleted { removed, cascaded })
            }
            LeagueCommand::GenerateFixtures {
                tournament_id,
                start_date,
                days_between_rounds,
            } => {
                let idx = position(&self.state.tournaments, &tournament_id)?;
                let fixtures =
                    generate_round_robin(&self.state.tournaments[idx], start_date, days_between_rounds);
                self.matches.delete_where("tournamentId", &tournament_id)?;
                let created = self.matches.create_many(fixtures)?;
                self.state.matches.retain(|m| m.tournament_id != tournament_id);
                self.state.matches.extend(created.iter().cloned());

                let mut tournament = self.state.tournaments[idx].clone();
                tournament.start_date = Some(start_date);
                tournament.end_date = created.iter().filter_map(|m| m.date).max();
                self.state.tournaments[idx] = self.tournaments.update(tournament)?;
                Ok(CommandOutcome::Fixtures(created))
            }
            LeagueCommand::RecordResult {
                match_id,
                home_score,
                away_score,
                is_final,
            } => {
                let idx = position(&self.state.matches, &match_id)?;
                let mut fixture = self.state.matches[idx].clone();
                fixture.home_score = Some(home_score);
                fixture.away_score = Some(away_score);
                fixture.status = if is_final {
                    MatchStatus::Finished
                } else {
                    MatchStatus::Live
                };
                let fixture = self.matches.update(fixture)?;
                self.state.matches[idx] = fixture.clone();
                Ok(CommandOutcome::Match(fixture))
            }

            LeagueCommand::CreatePost { post } => {
                let post = self.posts.create(post)?;
                self.state.posts.push(post.clone());
                Ok(CommandOutcome::Post(post))
            }
            LeagueCommand::DeletePost { post_id } => {
                let removed = self.posts.delete(&post_id)?;
                self.state.posts.retain(|p| p.id != post_id);
                Ok(CommandOutcome::Deleted { removed, cascaded: 0 })
            }

            LeagueCommand::AdjustSalaries => {
                let summary =
                    adjust_all_player_salaries(&self.players, self.config.economics.salary_epsilon)?;
                self.state.players = self.players.list_local()?;
                Ok(CommandOutcome::Adjusted(summary))
            }
            LeagueCommand::AdjustMarketValues => {
                let summary = adjust_all_player_market_values(
                    &self.players,
                    self.config.economics.market_value_epsilon,
                )?;
                self.state.players = self.players.list_local()?;
                Ok(CommandOutcome::Adjusted(summary))
            }
            LeagueCommand::ApplyWeeklyBonus => {
                let report = apply_weekly_victory_bonus(
                    &self.clubs,
                    &self.matches,
                    &self.ctx.store,
                    self.ctx.clock.now(),
                    self.config.economics.weekly_victory_bonus,
                )?;
                if report.is_some() {
                    self.state.clubs = self.clubs.list_local()?;
                }
                Ok(CommandOutcome::Bonus(report))
            }
            LeagueCommand::FlushOutbox => Ok(CommandOutcome::Flushed(self.ctx.flush_outbox()?)),
        }
    }

    fn club_names(&self) -> Vec<String> {
        self.state.clubs.iter().map(|c| c.name.clone()).collect()
    }

    /// Point every non-finished tournament at the current club names.
    fn sync_tournament_teams(&mut self) -> LigaResult<usize> {
        let names = self.club_names();
        let mut changed = Vec::new();
        for t in &mut self.state.tournaments {
            if t.status != TournamentStatus::Finished && t.teams != names {
                t.teams = names.clone();
                changed.push(t.clone());
            }
        }
        self.tournaments.update_many(&changed)
    }

    // ── Queries ────────────────────────────────────────────────

    pub fn roster(&self, club_id: &str) -> Vec<&Player> {
        roster(club_id, &self.state.players).collect()
    }

    pub fn labeled_matches(&self) -> Vec<LabeledMatch<'_>> {
        label_matches(&self.state.matches, &self.state.tournaments)
    }

    pub fn standings(&self, tournament_id: &str) -> LigaResult<Vec<StandingRow>> {
        let idx = position(&self.state.tournaments, tournament_id)?;
        let matches: Vec<Match> = self
            .state
            .matches
            .iter()
            .filter(|m| m.tournament_id == tournament_id)
            .cloned()
            .collect();
        Ok(compute_standings(&self.state.tournaments[idx].teams, &matches))
    }

    /// Check an offer for `player_id` from `buyer_id`. The elite gate, when
    /// configured, ranks the buyer in the first active tournament.
    pub fn validate_offer(&self, player_id: &str, buyer_id: &str, amount: Money) -> LigaResult<OfferVerdict> {
        let player = &self.state.players[position(&self.state.players, player_id)?];
        let buyer = &self.state.clubs[position(&self.state.clubs, buyer_id)?];
        let standings = match self
            .state
            .tournaments
            .iter()
            .find(|t| t.status == TournamentStatus::Active)
        {
            Some(t) => Some(self.standings(&t.id)?),
            None => None,
        };
        Ok(validate_offer_basics(
            player,
            buyer,
            amount,
            standings.as_deref(),
            &self.config.offers,
        ))
    }
}

fn join<T>(handle: ScopedJoinHandle<'_, LigaResult<T>>) -> LigaResult<T> {
    handle
        .join()
        .map_err(|_| LigaError::Other(anyhow::anyhow!("load worker panicked")))?
}

fn position<T: SyncEntity>(items: &[T], id: &str) -> LigaResult<usize> {
    items
        .iter()
        .position(|item| item.id() == id)
        .ok_or_else(|| LigaError::NotFound {
            collection: T::COLLECTION.name(),
            id: id.to_string(),
        })
}

/// The listed items, or seed data persisted locally when the listing
/// failed or came back empty.
fn or_seed<T: SyncEntity>(service: &EntitySync<T>, listed: LigaResult<Vec<T>>, seed: fn() -> Vec<T>) -> Vec<T> {
    let name = T::COLLECTION.name();
    match listed {
        Ok(items) if !items.is_empty() => return items,
        Ok(_) => log::info!("{name}: empty, loading seed data"),
        Err(e) => log::warn!("{name}: load failed, using seed data: {e}"),
    }
    let items = seed();
    if let Err(e) = service.context().store.put_many(T::COLLECTION, &items) {
        log::warn!("{name}: persisting seed data failed: {e}");
    }
    items
}
