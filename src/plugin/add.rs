use crate::{event::*, plugin::*};
use anyhow::Result;

pub struct Add;

/// Reply to `add a b`.
fn sum_reply(args: &[&str], prefix: &str) -> String {
    let [a, b, ..] = args else {
        return format!("Please provide two numbers. Usage: `{}add 5 10`", prefix);
    };

    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(a), Ok(b)) if a.is_finite() && b.is_finite() => format!("The sum is {}", a + b),
        _ => "Invalid numbers.".to_owned(),
    }
}

#[serenity::async_trait]
impl Plugin for Add {
    fn name(&self) -> &'static str {
        "add"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        Some(usage_line(ctx, self.name(), " <a> <b>", "add two numbers").await)
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, args)) = event.is_bot_cmd(ctx, self.name()).await else {
            return Ok(EventHandled::No);
        };

        let prefix = ctx.cfg.read().await.general.command_prefix.clone();
        msg.channel_id
            .say(ctx.http, sum_reply(&args, &prefix))
            .await?;
        Ok(EventHandled::Yes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_integers_and_decimals() {
        assert_eq!(sum_reply(&["5", "10"], "!"), "The sum is 15");
        assert_eq!(sum_reply(&["1.5", "-0.25"], "!"), "The sum is 1.25");
        assert_eq!(sum_reply(&["2", "3", "ignored"], "!"), "The sum is 5");
    }

    #[test]
    fn rejects_missing_or_bad_numbers() {
        assert_eq!(
            sum_reply(&["5"], "!"),
            "Please provide two numbers. Usage: `!add 5 10`"
        );
        assert_eq!(sum_reply(&["five", "10"], "!"), "Invalid numbers.");
        assert_eq!(sum_reply(&["inf", "1"], "!"), "Invalid numbers.");
    }
}
