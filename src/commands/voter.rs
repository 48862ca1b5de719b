use log::info;
use serenity::builder::CreateApplicationCommand;
use serenity::model::application::command::CommandOptionType;
use serenity::model::application::interaction::application_command::ApplicationCommandInteraction;
use serenity::prelude::*;
use std::fmt::Write;

use super::{send_error_response, send_response, string_option, subcommand, CommandResult};
use crate::app::AppState;
use crate::models::{Candidate, Preference, MAX_STRENGTH};
use crate::store::CandidateSource;

pub fn create_voter_command(command: &mut CreateApplicationCommand) -> &mut CreateApplicationCommand {
    command
        .name("voter")
        .description("Register or log in as a voter")
        .create_option(|option| {
            option
                .name("register")
                .description("Register a new voter")
                .kind(CommandOptionType::SubCommand)
                .create_sub_option(|sub_option| {
                    sub_option
                        .name("id")
                        .description("5-digit voter id")
                        .kind(CommandOptionType::String)
                        .required(true)
                })
                .create_sub_option(|sub_option| {
                    sub_option
                        .name("name")
                        .description("Display name")
                        .kind(CommandOptionType::String)
                        .required(true)
                })
        })
        .create_option(|option| {
            option
                .name("login")
                .description("Log in with your voter id")
                .kind(CommandOptionType::SubCommand)
                .create_sub_option(|sub_option| {
                    sub_option
                        .name("id")
                        .description("5-digit voter id")
                        .kind(CommandOptionType::String)
                        .required(true)
                })
        })
        .create_option(|option| {
            option
                .name("preferences")
                .description("Show the preferences of the voter you are logged in as")
                .kind(CommandOptionType::SubCommand)
        })
}

pub async fn handle_voter_command(state: &AppState, ctx: &Context, command: &ApplicationCommandInteraction) -> CommandResult {
    let Some(sub) = subcommand(command) else {
        send_error_response(ctx, command, "No subcommand provided").await?;
        return Ok(());
    };

    match sub.name.as_str() {
        "register" => {
            let id = string_option(sub, "id").unwrap_or_default();
            let name = string_option(sub, "name").unwrap_or_default();
            let registered = {
                let session = state.session.lock().await;
                session.register_voter(&state.database, id, name).await
            };
            match registered {
                Ok(voter) => {
                    state.bind_login(command.user.id, &voter.identifier).await;
                    let text = format!(
                        "Registered **{}** as voter `{}`. You are now logged in.",
                        voter.display_name, voter.identifier
                    );
                    send_response(ctx, command, &text, true).await?;
                }
                Err(e) => send_error_response(ctx, command, &e.to_string()).await?,
            }
        }
        "login" => {
            let id = string_option(sub, "id").unwrap_or_default();
            let login = {
                let mut session = state.session.lock().await;
                session.login_voter(&state.database, id).await
            };
            match login {
                Ok(login) => {
                    info!("Discord user {} logged in as voter {}", command.user.id, login.voter.identifier);
                    state.bind_login(command.user.id, &login.voter.identifier).await;
                    let candidates = state.database.list_candidates().await?;
                    let mut text = format!("Welcome back, **{}**.\n", login.voter.display_name);
                    text.push_str(&preference_list(&candidates, &login.preferences));
                    send_response(ctx, command, &text, true).await?;
                }
                Err(e) => send_error_response(ctx, command, &e.to_string()).await?,
            }
        }
        "preferences" => {
            let Some(id) = state.logged_in_as(command.user.id).await else {
                send_error_response(ctx, command, "Log in first with `/voter login`.").await?;
                return Ok(());
            };
            let preferences = {
                let session = state.session.lock().await;
                session.voter_preferences(&state.database, &id).await
            };
            match preferences {
                Ok(preferences) => {
                    let candidates = state.database.list_candidates().await?;
                    send_response(ctx, command, &preference_list(&candidates, &preferences), true).await?;
                }
                Err(e) => send_error_response(ctx, command, &e.to_string()).await?,
            }
        }
        _ => send_error_response(ctx, command, "Unknown subcommand").await?,
    }

    Ok(())
}

fn preference_list(candidates: &[Candidate], preferences: &[Preference]) -> String {
    if preferences.is_empty() {
        return "No preferences yet.".to_string();
    }
    let mut out = String::from("**Your preferences**\n");
    for preference in preferences {
        let name = candidates
            .iter()
            .find(|c| c.id == preference.candidate_id)
            .map_or("Unknown candidate", |c| c.name.as_str());
        let _ = writeln!(
            out,
            "{}: {} ({}/{})",
            name, preference.sentiment, preference.strength, MAX_STRENGTH
        );
    }
    out.trim_end().to_string()
}
