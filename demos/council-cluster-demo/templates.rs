use council::Member;
use maud::*;

use crate::application::{Application, RunningCouncil};

fn html_page_structure(content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        head {
            meta charset="utf-8";
            link rel="stylesheet" href="/picnic.min.css";
            link rel="stylesheet" href="/main.css";
            title { "Council Demo App" }
        }
        body {
            (content)
        }
    }
}

fn navigation(node_ids: &[i64], instance: &RunningCouncil) -> Markup {
    html! {
        nav {
            div class="nav-content" {
                label { "Select a node: " }
                select onchange="location = `/?node_id=${this.value}`;" {
                    @for node_id in node_ids {
                        option selected[*node_id == instance.council_instance.this_unique_address().uid] value={(node_id.to_string())} { (node_id.to_string()) }
                    }
                }
            }

        }
    }
}

async fn render_node(node_ids: &[i64], instance: &RunningCouncil) -> Markup {
    let this_unique_address = instance.council_instance.this_unique_address().clone();
    let members: Vec<Member> = instance
        .council_instance
        .members()
        .await
        .map(|set| set.into_iter().collect())
        .unwrap_or_default();
    let last_event = instance.last_event_clone().await;

    html! {
        (navigation(node_ids, instance))
        main {
            h2 { "This node" }
            strong { "Address: " } (this_unique_address.to_string())
            h2 { "Known members" }
            div class="card-grid" {
                @for member in &members {
                    div class="card" {
                        header {
                            a href={"/?node_id=" (member.unique_address.uid.to_string()) } {
                                (member.unique_address.to_string())
                                @if member.unique_address == this_unique_address {
                                    " (This node)"
                                }
                            }
                        }
                        ul {
                            li { strong { "Datacenter: " } (member.data_center()) }
                            li { strong { "Status: " } (member.status().to_string()) }
                            li { strong { "Up number: " } (member.up_number().to_string()) }
                            li { strong { "App version: " } (member.app_version().to_string()) }
                        }
                    }
                }
            }
            h2 { "Last membership event" }
            div class="card" {
                pre { (last_event.map(|e| format!("{e:#?}")).unwrap_or_else(|| "none yet".to_string())) }
            }
            h2 { "Raw member set" }
            div class="card" id="raw-cluster-state" {
                pre { (format!("{members:#?}")) }
            }
        }
    }
}

fn not_found() -> Markup {
    html! {
        div {
            "Not found"
        }
    }
}

pub async fn home_page(app: &Application, chosen_id: Option<i64>) -> Markup {
    let node_ids: Vec<i64> = app.instances.keys().cloned().collect();
    let instance = chosen_id
        .and_then(|id| app.instances.get(&id))
        .or_else(|| app.instances.values().next());

    let content = match instance {
        Some(instance) => render_node(&node_ids[..], instance).await,
        None => not_found(),
    };

    html_page_structure(html! {
        (content)
    })
}
