pub mod election;
pub mod voter;

use serenity::model::application::interaction::application_command::{
    ApplicationCommandInteraction, CommandDataOption,
};
use serenity::model::application::interaction::InteractionResponseType;
use serenity::prelude::*;

use crate::notify::truncate;

pub type CommandResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// The subcommand the user picked, if any.
pub fn subcommand(command: &ApplicationCommandInteraction) -> Option<&CommandDataOption> {
    command.data.options.first()
}

pub fn string_option<'a>(subcommand: &'a CommandDataOption, name: &str) -> Option<&'a str> {
    subcommand
        .options
        .iter()
        .find(|option| option.name == name)
        .and_then(|option| option.value.as_ref())
        .and_then(|value| value.as_str())
}

pub fn integer_option(subcommand: &CommandDataOption, name: &str) -> Option<i64> {
    subcommand
        .options
        .iter()
        .find(|option| option.name == name)
        .and_then(|option| option.value.as_ref())
        .and_then(|value| value.as_i64())
}

pub async fn send_response(
    ctx: &Context,
    command: &ApplicationCommandInteraction,
    content: &str,
    ephemeral: bool,
) -> Result<(), serenity::Error> {
    command
        .create_interaction_response(&ctx.http, |response| {
            response
                .kind(InteractionResponseType::ChannelMessageWithSource)
                .interaction_response_data(|message| message.content(truncate(content)).ephemeral(ephemeral))
        })
        .await
}

pub async fn send_error_response(
    ctx: &Context,
    command: &ApplicationCommandInteraction,
    error_message: &str,
) -> Result<(), serenity::Error> {
    send_response(ctx, command, error_message, true).await
}

/// Acknowledge now and fill the message in once a long operation finishes.
pub async fn defer(ctx: &Context, command: &ApplicationCommandInteraction) -> Result<(), serenity::Error> {
    command
        .create_interaction_response(&ctx.http, |response| {
            response.kind(InteractionResponseType::DeferredChannelMessageWithSource)
        })
        .await
}

pub async fn edit_deferred(
    ctx: &Context,
    command: &ApplicationCommandInteraction,
    content: &str,
) -> Result<(), serenity::Error> {
    command
        .edit_original_interaction_response(&ctx.http, |response| response.content(truncate(content)))
        .await?;
    Ok(())
}
