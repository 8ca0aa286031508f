/**
 * CONNECTION HANDLER - Boucle lecture/réponse par connexion agent
 *
 * RÔLE :
 * Possède une socket agent pour toute sa durée de vie : lit les lignes,
 * les classifie via le codec, met à jour le registre et livre les
 * commandes en attente.
 *
 * PANNES :
 * Une erreur I/O est fatale pour LA connexion (le handler sort), jamais
 * pour le coordinateur : aucun agent ne peut en affecter un autre. Pas de
 * retry côté coordinateur, la reconnexion est la responsabilité de l'agent.
 */

use crate::codec::{self, Inbound, Outbound};
use crate::dispatch::SharedCommandDispatcher;
use crate::models::now_ms;
use crate::registry::SharedClientRegistry;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

/// Boucle d'accept : une task tokio par connexion acceptée.
/// Un échec d'accept est loggé puis réessayé, jamais escaladé.
pub async fn serve_agents(
    listener: TcpListener,
    registry: SharedClientRegistry,
    dispatcher: SharedCommandDispatcher,
) {
    loop {
        match listener.accept().await {
            Ok((socket, addr)) => {
                let registry = registry.clone();
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move {
                    handle_agent(socket, addr, registry, dispatcher).await;
                });
            }
            Err(e) => {
                eprintln!("[agents] accept failed: {e}");
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}

async fn handle_agent(
    socket: TcpStream,
    addr: SocketAddr,
    registry: SharedClientRegistry,
    dispatcher: SharedCommandDispatcher,
) {
    println!("[agents] client connected: {addr}");
    let (read_half, mut write_half) = socket.into_split();
    let mut lines = BufReader::new(read_half).lines();
    // id du dernier rapport reçu sur CETTE connexion ; une connexion qui
    // n'a jamais rapporté ne laisse pas de trace au départ
    let mut last_client_id: Option<String> = None;

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                println!("[agents] client disconnected: {addr} ({e})");
                break;
            }
        };

        let reply = match codec::decode(&line) {
            Inbound::Approval(approval) => {
                if approval.action.eq_ignore_ascii_case("monitoring") {
                    // la commande en attente meurt ici, qu'elle ait été
                    // livrée ou non ; le consentement est écrasé
                    dispatcher.clear(&approval.client_id);
                    registry.set_monitoring_granted(&approval.client_id, approval.granted);
                    println!(
                        "[agents] approval from {}: monitoring granted={}",
                        approval.client_id, approval.granted
                    );
                }
                Outbound::Ack
            }
            Inbound::Report(report) => {
                registry.upsert(&report, now_ms());
                println!("[agents] {}", report.summary());
                last_client_id = Some(report.client_id.clone());
                match dispatcher.drain(&report.client_id) {
                    Some(command) => Outbound::Command(command),
                    None => Outbound::Ack,
                }
            }
            Inbound::Screenshot(shot) => {
                // le payload n'est jamais loggé
                println!(
                    "[agents] screenshot from {}: granted={} reason={}",
                    shot.client_id,
                    shot.granted,
                    shot.reason.as_deref().unwrap_or("-")
                );
                Outbound::Ack
            }
            Inbound::Unrecognized => {
                println!("[agents] heartbeat from {addr}: {line}");
                Outbound::Ack
            }
        };

        let mut out = codec::encode(&reply);
        out.push('\n');
        if let Err(e) = write_half.write_all(out.as_bytes()).await {
            println!("[agents] client disconnected: {addr} ({e})");
            break;
        }
    }

    if let Some(client_id) = last_client_id {
        registry.mark_offline(&client_id, now_ms());
    }
    println!("[agents] connection closed: {addr}");
}
