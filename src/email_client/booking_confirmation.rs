use super::EmailMessage;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

/// Data rendered into the booking confirmation email
#[derive(Debug, Clone)]
pub struct BookingConfirmation {
    pub to: String,
    pub user_name: Option<String>,
    pub activity_title: String,
    pub activity_location: String,
    pub date: NaiveDate,
    pub participants: i32,
    pub total_price: Decimal,
    pub booking_id: Uuid,
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

impl BookingConfirmation {
    fn greeting_name(&self) -> &str {
        self.user_name.as_deref().unwrap_or("Guest")
    }

    fn participants_label(&self) -> String {
        if self.participants == 1 {
            "1 person".to_string()
        } else {
            format!("{} people", self.participants)
        }
    }

    pub fn subject(&self) -> String {
        format!("Your booking is confirmed for {}", self.activity_title)
    }

    /// Render into an email from `from`
    pub fn render(&self, from: &str) -> EmailMessage {
        let date = self.date.format("%B %-d, %Y").to_string();
        let participants = self.participants_label();

        let text = format!(
            "Hi {name},\n\n\
             Great news! Your booking has been confirmed.\n\n\
             {title}\n\
             Location: {location}\n\
             Date: {date}\n\
             Participants: {participants}\n\
             Total paid: ${total}\n\n\
             Booking ID: {id}\n\n\
             Arrive 15 minutes early for check-in.\n\
             Questions? Contact us at support@movinature.com\n",
            name = self.greeting_name(),
            title = self.activity_title,
            location = self.activity_location,
            date = date,
            participants = participants,
            total = self.total_price,
            id = self.booking_id,
        );

        let html = format!(
            "<h1>movinature</h1>\
             <h2>Booking Confirmed!</h2>\
             <p>Hi {name},</p>\
             <p>Great news! Your booking has been confirmed. We're excited to see you on your adventure!</p>\
             <h3>{title}</h3>\
             <p><strong>Location:</strong> {location}</p>\
             <p><strong>Date:</strong> {date}</p>\
             <p><strong>Participants:</strong> {participants}</p>\
             <p><strong>Total Paid:</strong> ${total}</p>\
             <p>Booking ID: <strong>{id}</strong></p>\
             <p>Arrive 15 minutes early for check-in.</p>\
             <p>Questions? Contact us at support@movinature.com</p>",
            name = escape_html(self.greeting_name()),
            title = escape_html(&self.activity_title),
            location = escape_html(&self.activity_location),
            date = date,
            participants = participants,
            total = self.total_price,
            id = self.booking_id,
        );

        EmailMessage {
            from: from.to_string(),
            to: vec![self.to.clone()],
            subject: self.subject(),
            html,
            text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn confirmation() -> BookingConfirmation {
        BookingConfirmation {
            to: "parent@example.com".to_string(),
            user_name: None,
            activity_title: "Kids <Kayak> Camp".to_string(),
            activity_location: "Lake Tahoe".to_string(),
            date: NaiveDate::from_ymd_opt(2030, 10, 25).unwrap(),
            participants: 1,
            total_price: Decimal::new(5000, 2),
            booking_id: Uuid::nil(),
        }
    }

    #[test]
    fn test_render_confirmation() {
        let email = confirmation().render("noreply@movinature.com");
        assert_eq!(email.to, vec!["parent@example.com"]);
        assert_eq!(email.subject, "Your booking is confirmed for Kids <Kayak> Camp");
        assert!(email.text.contains("Hi Guest"));
        assert!(email.text.contains("October 25, 2030"));
        assert!(email.text.contains("1 person"));
        assert!(email.text.contains("$50.00"));
        assert!(email.html.contains("Kids &lt;Kayak&gt; Camp"));
    }
}
