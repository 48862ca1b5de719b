use crate::app::AppState;
use crate::commands::election::{announce_results, BALLOT_BUTTON_PREFIX};
use crate::notify::{truncate, vote_summary};
use serenity::model::application::interaction::{Interaction, InteractionResponseType};
use serenity::model::application::interaction::application_command::ApplicationCommandInteraction;
use serenity::model::application::interaction::message_component::MessageComponentInteraction;
use serenity::prelude::*;
use log::{info, warn, error};

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

// Handle slash commands
pub async fn handle_command(
    state: &AppState,
    ctx: &Context,
    command: &ApplicationCommandInteraction,
) -> HandlerResult {
    info!("Received command: {}", command.data.name);
    match command.data.name.as_str() {
        "election" => crate::commands::election::handle_election_command(state, ctx, command).await?,
        "voter" => crate::commands::voter::handle_voter_command(state, ctx, command).await?,
        _ => {
            crate::commands::send_error_response(ctx, command, "Unknown command").await?;
        }
    }
    Ok(())
}

// Candidate id from a ballot button's custom_id: ballot_<candidate_id>
fn parse_ballot_button(custom_id: &str) -> Option<i64> {
    custom_id.strip_prefix(BALLOT_BUTTON_PREFIX)?.parse().ok()
}

async fn reply_ephemeral(
    ctx: &Context,
    component: &MessageComponentInteraction,
    content: &str,
) -> Result<(), serenity::Error> {
    component
        .create_interaction_response(&ctx.http, |response| {
            response
                .kind(InteractionResponseType::ChannelMessageWithSource)
                .interaction_response_data(|message| message.content(content).ephemeral(true))
        })
        .await
}

// Ballot buttons shown by `/election vote`
pub async fn handle_component(
    state: &AppState,
    ctx: &Context,
    component: &MessageComponentInteraction,
) -> HandlerResult {
    let custom_id = &component.data.custom_id;
    info!("Received component interaction: {}", custom_id);

    let Some(candidate_id) = parse_ballot_button(custom_id) else {
        warn!("Unhandled component custom_id: {}", custom_id);
        reply_ephemeral(ctx, component, "Unknown button action.").await?;
        return Ok(());
    };

    let Some(voter_id) = state.logged_in_as(component.user.id).await else {
        reply_ephemeral(ctx, component, "Log in first with `/voter login`.").await?;
        return Ok(());
    };

    match state.submit_vote(&voter_id, candidate_id).await {
        Ok(outcome) => {
            let summary = vote_summary(&outcome);
            component
                .create_interaction_response(&ctx.http, |response| {
                    response
                        .kind(InteractionResponseType::UpdateMessage)
                        .interaction_response_data(|message| {
                            message
                                .content(truncate(&summary))
                                .components(|c| c)
                        })
                })
                .await?;
            announce_results(state, ctx).await;
        }
        Err(e) => reply_ephemeral(ctx, component, &e.to_string()).await?,
    }

    Ok(())
}

pub async fn handle_interaction(
    state: &AppState,
    ctx: &Context,
    interaction: Interaction,
) {
    let result = match interaction {
        Interaction::ApplicationCommand(command) => {
            handle_command(state, ctx, &command).await
        }
        Interaction::MessageComponent(component) => {
            handle_component(state, ctx, &component).await
        }
        _ => {
            warn!("Unhandled interaction type: {:?}", interaction.kind());
            Ok(())
        }
    };

    if let Err(why) = result {
        error!("Interaction handler error: {:?}", why);
    }
}
