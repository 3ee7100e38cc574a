//! Bundled starter data, used when a collection comes back empty.

use crate::{
    economics::{market_value_for, salary_for},
    model::{Club, Contract, Player, Post, Tournament, TournamentStatus},
};

const CLUBS: &[(&str, &str, &str, i64)] = &[
    ("seed-club-1", "Atlético Pampa", "ATP", 120_000_000),
    ("seed-club-2", "Deportivo Andes", "DAN", 95_000_000),
    ("seed-club-3", "Real Costa Sur", "RCS", 110_000_000),
    ("seed-club-4", "Unión Litoral", "ULI", 80_000_000),
];

// (id, name, age, position, nationality, club, overall)
const PLAYERS: &[(&str, &str, u32, &str, &str, Option<&str>, u32)] = &[
    ("seed-player-1", "Matías Herrera", 27, "POR", "Argentina", Some("seed-club-1"), 78),
    ("seed-player-2", "Julián Rojas", 24, "DFC", "Chile", Some("seed-club-1"), 81),
    ("seed-player-3", "Santiago Paredes", 29, "MC", "Uruguay", Some("seed-club-2"), 84),
    ("seed-player-4", "Diego Molina", 22, "DC", "Argentina", Some("seed-club-2"), 76),
    ("seed-player-5", "Tomás Aguirre", 31, "MCO", "Paraguay", Some("seed-club-3"), 88),
    ("seed-player-6", "Lucas Benítez", 26, "LD", "Argentina", Some("seed-club-3"), 74),
    ("seed-player-7", "Nicolás Vera", 25, "ED", "Colombia", Some("seed-club-4"), 79),
    ("seed-player-8", "Emiliano Castro", 33, "DC", "Argentina", None, 72),
];

pub fn clubs() -> Vec<Club> {
    CLUBS
        .iter()
        .map(|(id, name, short, budget)| Club {
            id: (*id).into(),
            name: (*name).into(),
            short_name: Some((*short).into()),
            logo: None,
            budget: *budget,
            manager_id: None,
        })
        .collect()
}

pub fn players() -> Vec<Player> {
    PLAYERS
        .iter()
        .map(|(id, name, age, position, nationality, club, overall)| Player {
            id: (*id).into(),
            name: (*name).into(),
            age: Some(*age),
            position: (*position).into(),
            nationality: (*nationality).into(),
            club_id: club.map(Into::into),
            overall: Some(*overall),
            transfer_value: market_value_for(Some(*overall)),
            contract: Contract {
                salary: salary_for(Some(*overall)),
                expires: None,
            },
            transfer_listed: false,
        })
        .collect()
}

pub fn tournaments() -> Vec<Tournament> {
    vec![Tournament {
        id: "seed-tournament-1".into(),
        name: "Liga Master Apertura".into(),
        teams: CLUBS.iter().map(|(_, name, _, _)| (*name).to_string()).collect(),
        rounds: 2,
        status: TournamentStatus::Upcoming,
        start_date: None,
        end_date: None,
        legacy_matches: Vec::new(),
    }]
}

pub fn posts() -> Vec<Post> {
    vec![Post {
        id: "seed-post-1".into(),
        title: "Arranca la Liga Master".into(),
        content: "Los clubes ya pueden armar sus planteles para el torneo Apertura.".into(),
        author: Some("Administración".into()),
        category: Some("noticias".into()),
        published_at: None,
    }]
}
