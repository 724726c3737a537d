//! Terminal mode that runs the advice flow once, to check a local model
//! without going through HTTP.

use crate::advisor::Advisor;
use crate::sanitize::sanitize;
use futures::StreamExt;
use log::info;
use std::error::Error;
use std::io::Write;
use tokio::io::{ AsyncBufReadExt, BufReader };

const RULE_WIDTH: usize = 80;

/// One bank transaction in the shape a Plaid `/transactions/sync` reply uses.
pub const SAMPLE_SPENDING_DATA: &str = r#"
"added": [
  {
    "account_id": "BxBXxLj1m4HMXBm9WZZmCWVbPjX16EHwv99vp",
    "amount": 72.1,
    "iso_currency_code": "USD",
    "counterparties": [
      {
        "name": "Walmart",
        "type": "merchant",
        "website": "walmart.com",
        "confidence_level": "VERY_HIGH"
      }
    ],
    "date": "2023-09-24",
    "authorized_date": "2023-09-22",
    "location": {
      "address": "13425 Community Rd",
      "city": "Poway",
      "region": "CA",
      "postal_code": "92064",
      "country": "US"
    },
    "name": "PURCHASE WM SUPERCENTER #1700",
    "merchant_name": "Walmart",
    "payment_channel": "in store",
    "pending": false,
    "personal_finance_category": {
      "primary": "GENERAL_MERCHANDISE",
      "detailed": "GENERAL_MERCHANDISE_SUPERSTORES",
      "confidence_level": "VERY_HIGH"
    },
    "transaction_type": "place"
  }
],
"#;

/// Joins input lines until the first pair of consecutive empty lines. The
/// terminating empty line is not part of the result.
pub fn collect_until_double_blank<I>(lines: I) -> String
    where I: IntoIterator<Item = String>
{
    let mut collected: Vec<String> = Vec::new();
    for line in lines {
        if line.is_empty() && collected.last().is_some_and(|l| l.is_empty()) {
            collected.pop();
            break;
        }
        collected.push(line);
    }
    collected.join("\n")
}

async fn read_spending_data() -> Result<String, Box<dyn Error + Send + Sync>> {
    println!("Enter your spending data (press Enter twice when done):");
    let mut reader = BufReader::new(tokio::io::stdin()).lines();
    let mut lines = Vec::new();
    let mut previous_blank = false;
    while let Some(line) = reader.next_line().await? {
        let blank = line.is_empty();
        lines.push(line);
        if blank && previous_blank {
            break;
        }
        previous_blank = blank;
    }
    Ok(collect_until_double_blank(lines))
}

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

pub async fn run(
    advisor: &Advisor,
    interactive: bool,
    stream: bool
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let spending_data = if interactive {
        read_spending_data().await?
    } else {
        println!("Testing model {} with sample data...\n", advisor.model());
        println!("Input:\n{}", SAMPLE_SPENDING_DATA);
        SAMPLE_SPENDING_DATA.to_string()
    };
    info!("Probe input is {} bytes", spending_data.len());

    println!("\n{}\n", rule());
    println!("Model Response:\n{}", rule());

    let advice = if stream {
        let mut tokens = advisor.advise_stream(&spending_data).await?;
        let mut raw = String::new();
        while let Some(token) = tokens.next().await {
            let token = token?;
            print!("{}", token);
            std::io::stdout().flush().ok();
            raw.push_str(&token);
        }
        println!("\n\n{}\nFinal Answer:\n{}", rule(), rule());
        sanitize(&raw)
    } else {
        advisor.advise(&spending_data).await?
    };
    println!("{}", advice);

    if !interactive {
        println!("\n{}", rule());
        println!("\nTip: run `fin-advisor probe --interactive` to test with your own data");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn stops_at_double_blank() {
        let input = owned(&["Rent: $1500", "", "Food: $600", "", "", "ignored"]);
        assert_eq!(collect_until_double_blank(input), "Rent: $1500\n\nFood: $600");
    }

    #[test]
    fn keeps_everything_at_eof() {
        let input = owned(&["Rent: $1500", "Food: $600"]);
        assert_eq!(collect_until_double_blank(input), "Rent: $1500\nFood: $600");
    }

    #[test]
    fn two_leading_blanks_give_empty_input() {
        assert_eq!(collect_until_double_blank(owned(&["", ""])), "");
    }

    #[test]
    fn sample_data_names_the_merchant() {
        assert!(SAMPLE_SPENDING_DATA.contains("\"merchant_name\": \"Walmart\""));
    }
}
