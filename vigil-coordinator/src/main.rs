/**
 * VIGIL COORDINATOR - Point d'entrée du serveur de supervision
 *
 * RÔLE : Orchestration des modules : config, registre, dispatcher,
 * boucle d'accept agents, façade HTTP. Bootstrap complet du coordinateur.
 *
 * ARCHITECTURE : un worker tokio par connexion agent (lectures bloquantes
 * ligne à ligne) + handlers HTTP sur le même pool. Le registre et le
 * dispatcher sont les seuls états partagés.
 *
 * PANNES : seul un échec de bind au démarrage est fatal au process ;
 * tout le reste est absorbé à la frontière où il se produit.
 */

mod codec;
mod config;
mod connection;
mod dispatch;
mod http;
mod models;
mod registry;

use crate::dispatch::CommandDispatcher;
use crate::registry::ClientRegistry;
use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Charger les variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok();

    let cfg = config::load_config().await;
    let cfg = config::apply_args(cfg, std::env::args().skip(1));

    let registry = Arc::new(ClientRegistry::new());
    let dispatcher = Arc::new(CommandDispatcher::new());

    // protocole ligne agents
    let agent_addr = SocketAddr::from(([0, 0, 0, 0], cfg.agent_port));
    let agent_listener = TcpListener::bind(agent_addr)
        .await
        .with_context(|| format!("bind agent listener on {agent_addr}"))?;
    println!("[coordinator] monitor server listening on port {}", cfg.agent_port);
    tokio::spawn(connection::serve_agents(
        agent_listener,
        registry.clone(),
        dispatcher.clone(),
    ));

    // façade HTTP + dashboard
    let app = http::build_router(http::AppState { registry, dispatcher });
    let http_addr = SocketAddr::from(([0, 0, 0, 0], cfg.http_port()));
    let http_listener = TcpListener::bind(http_addr)
        .await
        .with_context(|| format!("bind http listener on {http_addr}"))?;
    println!("[coordinator] web UI listening on http://localhost:{}", cfg.http_port());
    axum::serve(http_listener, app).await.context("http server")?;

    Ok(())
}
