use crate::Alert;

pub struct EmailTemplate;

impl EmailTemplate {
    pub fn render(alert: &Alert) -> String {
        let header_color = match alert.kind.as_str() {
            "MA200_Crossover_Up" | "MA200_Crossover_Up_Lookback" => "#22c55e",
            "MA200_Crossover_Down" | "MA200_Crossover_Down_Lookback" => "#ef4444",
            "Volume" => "#3b82f6",
            "PriceChange" => "#f97316",
            _ => "#1e293b",
        };
        let header_label = alert.kind.replace('_', " ");

        format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><meta name="viewport" content="width=device-width,initial-scale=1"></head>
<body style="margin:0;padding:0;background:#f1f5f9;font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,sans-serif;">
<table width="100%" cellpadding="0" cellspacing="0" style="background:#f1f5f9;padding:32px 0;">
  <tr><td align="center">
    <table width="600" cellpadding="0" cellspacing="0" style="background:#ffffff;border-radius:8px;overflow:hidden;box-shadow:0 1px 3px rgba(0,0,0,0.1);">
      <tr><td style="background:{header_color};color:#fff;padding:12px 20px;font-size:18px;font-weight:700;">
        {symbol} &mdash; {header_label}
      </td></tr>
      <tr><td style="padding:16px 20px;color:#334155;">
        {body}
      </td></tr>
      <tr><td style="padding:16px 20px;border-top:1px solid #e2e8f0;">
        <p style="margin:0;color:#94a3b8;font-size:12px;">
          {subject}
          <br>Sent at {ts} UTC
        </p>
      </td></tr>
    </table>
    <p style="color:#94a3b8;font-size:11px;margin-top:16px;">TickerLens Alerts</p>
  </td></tr>
</table>
</body>
</html>"#,
            header_color = header_color,
            header_label = header_label,
            symbol = alert.symbol,
            body = alert.body_html,
            subject = alert.subject.replace('<', "&lt;").replace('>', "&gt;"),
            ts = alert.timestamp.format("%Y-%m-%d %H:%M:%S"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_embeds_body_and_subject() {
        let alert = Alert::new(
            "MA200_Crossover_Up",
            "NVDA",
            "ALERT: NVDA Price Crossover Above 200-Day MA!",
            "<p>Stock: NVDA</p>",
        );

        let html = EmailTemplate::render(&alert);

        assert!(html.contains("<p>Stock: NVDA</p>"));
        assert!(html.contains("NVDA &mdash; MA200 Crossover Up"));
        assert!(html.contains("#22c55e"));
        assert!(html.contains("ALERT: NVDA Price Crossover Above 200-Day MA!"));
    }
}
