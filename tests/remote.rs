use std::io::{BufRead, BufReader, Write};
use std::net::{Ipv4Addr, TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use santorini_tournament::players::{BreakerPlayer, ValidPlayer};
use santorini_tournament::prelude::*;
use santorini_tournament::remote::{PlayerRelay, ProxyPlayer};

fn listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

fn relay(player: impl Player + 'static, port: u16) -> thread::JoinHandle<Option<TournamentResult>> {
    thread::spawn(move || {
        PlayerRelay::connect(player, (Ipv4Addr::LOCALHOST, port))
            .unwrap()
            .run()
            .unwrap()
    })
}

#[test]
fn tournament_over_tcp() {
    let (listener, port) = listener();
    let clients = vec![
        relay(ValidPlayer::new("alice"), port),
        relay(BreakerPlayer::new("bob"), port),
        relay(ValidPlayer::new("Carol"), port),
    ];

    let remote = RemoteConfig::new(3, Duration::from_millis(200), port, Duration::from_secs(5));
    let players = remote.accept_players(&listener).unwrap();
    assert_eq!(players.len(), 3);

    let mut manager = TournamentManager::new(Configuration::new()).unwrap();
    let mut names: Vec<_> = players
        .into_iter()
        .map(|p| manager.accept_player(p))
        .collect();
    names.sort();
    assert_eq!(names, ["a", "alice", "bob"]);

    let result = manager.run();
    assert_eq!(result.kicked, ["bob"]);

    for client in clients {
        let received = client.join().unwrap().unwrap();
        let summary: Vec<_> = received
            .matches
            .iter()
            .map(|m| (m.winner.clone(), m.loser.clone(), m.rule_broken))
            .collect();
        let expected: Vec<_> = result
            .matches
            .iter()
            .map(|m| (m.winner.clone(), m.loser.clone(), m.rule_broken))
            .collect();
        assert_eq!(summary, expected);
    }
}

/// Registers as `name`, then answers the first request with `reply` and keeps the
/// connection open until the server closes it.
fn scripted_client(port: u16, name: &str, reply: Option<&'static str>) -> thread::JoinHandle<()> {
    let registration = format!("\"{name}\"\n");
    thread::spawn(move || {
        let mut stream = TcpStream::connect((Ipv4Addr::LOCALHOST, port)).unwrap();
        stream.write_all(registration.as_bytes()).unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut line = String::new();
        if let Some(reply) = reply {
            reader.read_line(&mut line).unwrap();
            stream.write_all(reply.as_bytes()).unwrap();
        }
        while reader.read_line(&mut line).is_ok_and(|n| n > 0) {}
    })
}

#[test]
fn malformed_reply_ends_the_connection() {
    let (listener, port) = listener();
    let client = scripted_client(port, "mallory", Some("{\"x\": 1}\n"));
    let (stream, _) = listener.accept().unwrap();
    let proxy = ProxyPlayer::handshake(stream, Duration::from_secs(5)).unwrap();
    assert_eq!(proxy.registered_name(), "mallory");

    let error = proxy.place_worker(&Board::new()).unwrap_err();
    assert!(matches!(error, PlayerError::Protocol { .. }), "{error}");
    assert_eq!(
        proxy.next_turn(&Board::new()).unwrap_err(),
        PlayerError::Defunct
    );

    drop(proxy);
    client.join().unwrap();
}

#[test]
fn silent_client_times_out() {
    let (listener, port) = listener();
    let client = scripted_client(port, "sleepy", None);
    let (stream, _) = listener.accept().unwrap();
    let proxy = ProxyPlayer::handshake(stream, Duration::from_millis(100)).unwrap();

    let error = proxy.place_worker(&Board::new()).unwrap_err();
    assert!(matches!(error, PlayerError::Timeout { .. }), "{error}");
    assert_eq!(proxy.set_opponent("bob").unwrap_err(), PlayerError::Defunct);

    drop(proxy);
    client.join().unwrap();
}

#[test]
fn registration_must_be_a_name() {
    let (listener, port) = listener();
    let client = thread::spawn(move || {
        let mut stream = TcpStream::connect((Ipv4Addr::LOCALHOST, port)).unwrap();
        stream.write_all(b"42\n").unwrap();
    });
    let (stream, _) = listener.accept().unwrap();
    assert!(ProxyPlayer::handshake(stream, Duration::from_secs(5)).is_err());
    client.join().unwrap();
}

#[test]
fn renamed_client_plays_under_its_new_name() {
    let (listener, port) = listener();
    let clients = [
        relay(ValidPlayer::new("Alice"), port),
        relay(ValidPlayer::new("bob"), port),
    ];
    let remote = RemoteConfig::new(2, Duration::from_millis(100), port, Duration::from_secs(5));
    let players = remote.accept_players(&listener).unwrap();

    let config = Configuration::new().with_games_per_round(1);
    let mut manager = TournamentManager::new(config).unwrap();
    for player in players {
        manager.accept_player(player);
    }
    let result = manager.run();

    assert!(result.kicked.is_empty());
    assert_eq!(result.matches.len(), 1);
    let m = &result.matches[0];
    let mut pair = [m.winner.as_str(), m.loser.as_str()];
    pair.sort();
    assert_eq!(pair, ["a", "bob"]);
    for client in clients {
        assert_eq!(client.join().unwrap().unwrap().matches.len(), 1);
    }
}

#[test]
fn trickling_reply_still_times_out() {
    let (listener, port) = listener();
    let client = thread::spawn(move || {
        let mut stream = TcpStream::connect((Ipv4Addr::LOCALHOST, port)).unwrap();
        stream.write_all(b"\"slowpoke\"\n").unwrap();
        // a byte of whitespace well within every read timeout, for far longer than the call
        for _ in 0..20 {
            thread::sleep(Duration::from_millis(30));
            if stream.write_all(b" ").is_err() {
                return;
            }
        }
        let _ = stream.write_all(b"[0, 0]\n");
    });
    let (stream, _) = listener.accept().unwrap();
    let timeout = Duration::from_millis(100);
    let proxy = ProxyPlayer::handshake(stream, timeout).unwrap();

    let start = Instant::now();
    let error = proxy.place_worker(&Board::new()).unwrap_err();
    assert!(matches!(error, PlayerError::Timeout { .. }), "{error}");
    assert!(start.elapsed() < timeout * 4, "took {:?}", start.elapsed());
    assert_eq!(
        proxy.next_turn(&Board::new()).unwrap_err(),
        PlayerError::Defunct
    );

    drop(proxy);
    client.join().unwrap();
}

#[test]
fn late_registration_inside_the_window_is_kept() {
    let (listener, port) = listener();
    let early = relay(ValidPlayer::new("alice"), port);
    let late = thread::spawn(move || {
        // connect just before the window closes, register just after
        thread::sleep(Duration::from_millis(150));
        let mut stream = TcpStream::connect((Ipv4Addr::LOCALHOST, port)).unwrap();
        thread::sleep(Duration::from_millis(150));
        stream.write_all(b"\"bob\"\n").unwrap();
        let mut line = String::new();
        let mut reader = BufReader::new(stream);
        while reader.read_line(&mut line).is_ok_and(|n| n > 0) {}
    });

    let remote = RemoteConfig::new(1, Duration::from_millis(200), port, Duration::from_secs(2));
    let players = remote.accept_players(&listener).unwrap();

    let mut names: Vec<_> = players.iter().map(|p| p.name().unwrap()).collect();
    names.sort();
    assert_eq!(names, ["alice", "bob"]);

    let result = TournamentResult {
        matches: vec![MatchResult::new("alice", "bob", false, vec![])],
        kicked: vec![],
    };
    for player in &players {
        player.receive_tournament_result(&result).unwrap();
    }
    drop(players);
    late.join().unwrap();
    assert_eq!(early.join().unwrap(), Some(result));
}
