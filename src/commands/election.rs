use log::{error, info};
use serenity::builder::CreateApplicationCommand;
use serenity::model::application::command::CommandOptionType;
use serenity::model::application::component::ButtonStyle;
use serenity::model::application::interaction::application_command::ApplicationCommandInteraction;
use serenity::model::application::interaction::InteractionResponseType;
use serenity::model::channel::AttachmentType;
use serenity::prelude::*;
use std::borrow::Cow;

use super::{
    defer, edit_deferred, integer_option, send_error_response, send_response, string_option, subcommand,
    CommandResult,
};
use crate::app::AppState;
use crate::notify::{candidate_list, results_json, results_summary, round_summary, vote_summary, JsonReply};
use crate::store::CandidateSource;

pub const BALLOT_BUTTON_PREFIX: &str = "ballot_";

pub fn create_election_command(command: &mut CreateApplicationCommand) -> &mut CreateApplicationCommand {
    command
        .name("election")
        .description("Run a two-round mock election")
        .create_option(|option| {
            option
                .name("start")
                .description("Simulate the first round with automatic voters")
                .kind(CommandOptionType::SubCommand)
        })
        .create_option(|option| {
            option
                .name("vote")
                .description("Vote in the round that is waiting for you")
                .kind(CommandOptionType::SubCommand)
                .create_sub_option(|sub_option| {
                    sub_option
                        .name("candidate")
                        .description("Candidate id (see /election candidates); omit to pick from buttons")
                        .kind(CommandOptionType::Integer)
                        .required(false)
                })
                .create_sub_option(|sub_option| {
                    sub_option
                        .name("voter")
                        .description("Your 5-digit voter id, if you have not logged in")
                        .kind(CommandOptionType::String)
                        .required(false)
                })
        })
        .create_option(|option| {
            option
                .name("runoff")
                .description("Simulate the second round between the two finalists")
                .kind(CommandOptionType::SubCommand)
        })
        .create_option(|option| {
            option
                .name("results")
                .description("Show the current results")
                .kind(CommandOptionType::SubCommand)
                .create_sub_option(|sub_option| {
                    sub_option
                        .name("format")
                        .description("Output format")
                        .kind(CommandOptionType::String)
                        .add_string_choice("Text", "text")
                        .add_string_choice("JSON", "json")
                        .required(false)
                })
        })
        .create_option(|option| {
            option
                .name("reset")
                .description("Clear ballots and results and start over")
                .kind(CommandOptionType::SubCommand)
        })
        .create_option(|option| {
            option
                .name("candidates")
                .description("List the candidates")
                .kind(CommandOptionType::SubCommand)
        })
}

pub async fn handle_election_command(state: &AppState, ctx: &Context, command: &ApplicationCommandInteraction) -> CommandResult {
    let Some(sub) = subcommand(command) else {
        send_error_response(ctx, command, "No subcommand provided").await?;
        return Ok(());
    };

    match sub.name.as_str() {
        "start" => handle_start(state, ctx, command).await?,
        "vote" => {
            let candidate = integer_option(sub, "candidate");
            let voter = string_option(sub, "voter").map(str::to_string);
            handle_vote(state, ctx, command, candidate, voter).await?
        }
        "runoff" => handle_runoff(state, ctx, command).await?,
        "results" => {
            let json = string_option(sub, "format") == Some("json");
            handle_results(state, ctx, command, json).await?
        }
        "reset" => handle_reset(state, ctx, command).await?,
        "candidates" => {
            let candidates = state.database.list_candidates().await?;
            send_response(ctx, command, &candidate_list(&candidates), true).await?
        }
        _ => send_error_response(ctx, command, "Unknown subcommand").await?,
    }

    Ok(())
}

async fn handle_start(state: &AppState, ctx: &Context, command: &ApplicationCommandInteraction) -> CommandResult {
    info!("{} started a first round", command.user.name);
    defer(ctx, command).await?;

    let outcome = {
        let mut session = state.session.lock().await;
        session.run_first_round_auto(&state.database).await
    };

    match outcome {
        Ok(outcome) => {
            let summary = round_summary(&outcome);
            edit_deferred(ctx, command, &summary).await?;
            state.announcer.announce(&ctx.http, &summary).await;
        }
        Err(e) => edit_deferred(ctx, command, &format!("Could not run the first round: {}", e)).await?,
    }
    Ok(())
}

async fn handle_runoff(state: &AppState, ctx: &Context, command: &ApplicationCommandInteraction) -> CommandResult {
    info!("{} started a second round", command.user.name);
    defer(ctx, command).await?;

    let outcome = {
        let mut session = state.session.lock().await;
        session.run_second_round_auto(&state.database).await
    };

    match outcome {
        Ok(outcome) => {
            let summary = round_summary(&outcome);
            edit_deferred(ctx, command, &summary).await?;
            state.announcer.announce(&ctx.http, &summary).await;
        }
        Err(e) => edit_deferred(ctx, command, &format!("Could not run the second round: {}", e)).await?,
    }
    Ok(())
}

async fn handle_vote(
    state: &AppState,
    ctx: &Context,
    command: &ApplicationCommandInteraction,
    candidate: Option<i64>,
    voter: Option<String>,
) -> CommandResult {
    let voter_id = match voter {
        Some(voter) => voter,
        None => match state.logged_in_as(command.user.id).await {
            Some(voter) => voter,
            None => {
                send_error_response(ctx, command, "Log in first with `/voter login`, or pass your voter id.").await?;
                return Ok(());
            }
        },
    };

    let Some(candidate_id) = candidate else {
        return show_ballot(state, ctx, command, &voter_id).await;
    };

    match state.submit_vote(&voter_id, candidate_id).await {
        Ok(outcome) => {
            send_response(ctx, command, &vote_summary(&outcome), true).await?;
            announce_results(state, ctx).await;
        }
        Err(e) => send_error_response(ctx, command, &e.to_string()).await?,
    }
    Ok(())
}

/// Offer one button per candidate the voter may pick right now.
async fn show_ballot(
    state: &AppState,
    ctx: &Context,
    command: &ApplicationCommandInteraction,
    voter_id: &str,
) -> CommandResult {
    let choices = match state.ballot_choices().await {
        Ok(Some(choices)) if !choices.is_empty() => choices,
        Ok(_) => {
            send_error_response(ctx, command, "No round is waiting for votes. Start one with `/election start`.").await?;
            return Ok(());
        }
        Err(e) => {
            send_error_response(ctx, command, &e.to_string()).await?;
            return Ok(());
        }
    };
    // Buttons resolve the voter from the login map.
    state.bind_login(command.user.id, voter_id).await;

    command
        .create_interaction_response(&ctx.http, |response| {
            response
                .kind(InteractionResponseType::ChannelMessageWithSource)
                .interaction_response_data(|message| {
                    message
                        .ephemeral(true)
                        .content(format!("Voting as `{}`. Select ONE candidate:", voter_id))
                        .components(|c| {
                            for row_choices in choices.chunks(5) {
                                c.create_action_row(|row| {
                                    for candidate in row_choices {
                                        row.create_button(|btn| {
                                            btn.custom_id(format!("{}{}", BALLOT_BUTTON_PREFIX, candidate.id))
                                                .label(format!("{} ({})", candidate.name, candidate.party))
                                                .style(ButtonStyle::Primary)
                                        });
                                    }
                                    row
                                });
                            }
                            c
                        })
                })
        })
        .await?;
    Ok(())
}

async fn handle_results(
    state: &AppState,
    ctx: &Context,
    command: &ApplicationCommandInteraction,
    json: bool,
) -> CommandResult {
    let results = {
        let session = state.session.lock().await;
        session.get_results(&state.database).await
    };

    let results = match results {
        Ok(results) => results,
        Err(e) => {
            send_error_response(ctx, command, &e.to_string()).await?;
            return Ok(());
        }
    };

    if !json {
        send_response(ctx, command, &results_summary(&results), false).await?;
        return Ok(());
    }

    match results_json(&results)? {
        JsonReply::Inline(text) => send_response(ctx, command, &text, true).await?,
        JsonReply::Attachment(bytes) => {
            let file = AttachmentType::Bytes {
                data: Cow::Owned(bytes),
                filename: format!("results-{}.json", results.run_id),
            };
            command
                .create_interaction_response(&ctx.http, |response| {
                    response
                        .kind(InteractionResponseType::ChannelMessageWithSource)
                        .interaction_response_data(|message| {
                            message
                                .content("Results are too long for a message, see the attached file.")
                                .add_file(file)
                                .ephemeral(true)
                        })
                })
                .await?;
        }
    }
    Ok(())
}

async fn handle_reset(state: &AppState, ctx: &Context, command: &ApplicationCommandInteraction) -> CommandResult {
    info!("{} reset the election", command.user.name);
    let reset = {
        let mut session = state.session.lock().await;
        let previous = session.run_id();
        session.reset_election(&state.database).await.map(|()| previous)
    };

    match reset {
        Ok(previous) => {
            info!("Run {} discarded", previous);
            let text = "Election reset. Start a new one with `/election start`.";
            send_response(ctx, command, text, false).await?;
            state.announcer.announce(&ctx.http, text).await;
        }
        Err(e) => send_error_response(ctx, command, &e.to_string()).await?,
    }
    Ok(())
}

/// Push the current standings to the announcement channel.
pub async fn announce_results(state: &AppState, ctx: &Context) {
    let results = {
        let session = state.session.lock().await;
        session.get_results(&state.database).await
    };
    match results {
        Ok(results) => state.announcer.announce(&ctx.http, &results_summary(&results)).await,
        Err(e) => error!("Failed to load results for announcement: {}", e),
    }
}
