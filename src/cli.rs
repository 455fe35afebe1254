use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;

use crate::backend::retry::RetryPolicy;
use crate::backend::{Backend, Collection, Filter};
use crate::config::AppConfig;
use crate::error::DeskError;
use crate::model::parse_instant;
use crate::model::session::{Role, Session};
use crate::model::ticket::{NewTicket, TicketPatch, TicketPriority, TicketStatus, MAX_NEW_TICKET_TAGS};
use crate::query::{self, paginate, Criteria, Sort, SortDirection, SortField};
use crate::store::SessionStore;
use crate::tickets::{Fetcher, TicketDispatcher};

/// Run one subcommand against the configured backend and print the result.
pub async fn run(args: &[String], config: &AppConfig, backend: Arc<dyn Backend>) -> Result<()> {
    let Some((command, rest)) = args.split_first() else {
        print_help();
        return Ok(());
    };
    let retry = RetryPolicy::from(&config.retry);
    let fetcher = Fetcher::new(backend.clone(), retry);
    let dispatcher = TicketDispatcher::new(backend, retry);

    match command.as_str() {
        "list" => {
            let list = parse_list_args(rest, config.board.page_size)?;
            handle_list(&fetcher, &list).await
        }
        "create" => {
            let mut ticket = parse_create_args(rest)?;
            if ticket.requester.is_none() {
                let store = SessionStore::new()?;
                ticket.requester = store.current().map(|s| s.display_name().to_string());
            }
            let created = dispatcher.create(&ticket).await?;
            println!("Created {}: {}", created.id, created.title);
            Ok(())
        }
        "update" => {
            let update = parse_update_args(rest)?;
            handle_update(&fetcher, &dispatcher, &update).await
        }
        "delete" => {
            let [id] = rest else {
                bail!("Usage: servicedesk delete <id>");
            };
            dispatcher.delete(id).await?;
            println!("Deleted {id}");
            Ok(())
        }
        "articles" => {
            let list = parse_list_args(rest, usize::MAX)?;
            let staff = SessionStore::new()?
                .current()
                .is_some_and(|s| matches!(s.role, Role::Admin | Role::Agent));
            let articles = if staff {
                fetcher.articles().await?
            } else {
                fetcher.published_articles().await?
            };
            let visible = query::apply(&articles, &list.criteria, list.sort);
            for a in &visible {
                let state = if a.published { "published" } else { "draft" };
                println!("{:<10} {:<10} {:>6} views  {}", a.id, state, a.views, a.title);
            }
            println!("{} article(s)", visible.len());
            Ok(())
        }
        "accounts" => {
            for a in fetcher.accounts().await? {
                let email = a.email.as_deref().unwrap_or("-");
                let role = a.role.as_deref().unwrap_or("-");
                let active = if a.active { "" } else { "  (inactive)" };
                println!("{:<10} {:<24} {:<28} {role}{active}", a.id, a.name, email);
            }
            Ok(())
        }
        "count" => {
            let (collection, filters) = parse_count_args(rest)?;
            println!("{}", fetcher.count(collection, &filters).await?);
            Ok(())
        }
        "login" => {
            let (session, token) = parse_login_args(rest)?;
            let mut store = SessionStore::new()?;
            let same_user = store.current().is_some_and(|s| s.email == session.email);
            if same_user && store.token().is_some() {
                // Keep the existing id and token; only the profile changes.
                store.update(|s| {
                    s.name = session.name;
                    s.role = session.role;
                })?;
            } else {
                store.sign_in(session, token)?;
            }
            if let Some(s) = store.current() {
                println!("Signed in as {} <{}> ({})", s.display_name(), s.email, s.role);
            }
            Ok(())
        }
        "logout" => {
            SessionStore::new()?.sign_out()?;
            println!("Signed out");
            Ok(())
        }
        "whoami" => {
            let store = SessionStore::new()?;
            match store.current() {
                Some(s) => {
                    println!("{} <{}> ({})", s.display_name(), s.email, s.role);
                    if store.token().is_none() {
                        println!("warning: no auth token stored; run `servicedesk login` again");
                    }
                }
                None => println!("Not signed in"),
            }
            Ok(())
        }
        other => bail!("Unknown command '{other}'. Run `servicedesk help` for usage."),
    }
}

async fn handle_list(fetcher: &Fetcher, list: &ListArgs) -> Result<()> {
    let tickets = fetcher.tickets().await?;
    let visible = query::apply(&tickets, &list.criteria, list.sort);
    let page = paginate(&visible, list.page_size, list.page);

    for t in page.items {
        println!(
            "{:<10} {:<12} {:<9} {}",
            t.id,
            t.status.label(),
            t.priority.label(),
            t.title
        );
    }
    println!(
        "page {}/{} ({} matching, {})",
        page.number,
        page.total_pages,
        page.total_items,
        list.criteria.describe()
    );
    Ok(())
}

async fn handle_update(
    fetcher: &Fetcher,
    dispatcher: &TicketDispatcher,
    update: &UpdateArgs,
) -> Result<()> {
    let result = if update.if_unchanged {
        let tickets = fetcher.tickets().await?;
        let current = tickets
            .iter()
            .find(|t| t.id == update.id)
            .ok_or_else(|| DeskError::not_found(format!("ticket {}", update.id)))?;
        dispatcher
            .update_if_unchanged(&update.id, &update.patch, current.updated_at)
            .await
    } else {
        dispatcher.update(&update.id, &update.patch).await
    };

    match result {
        Ok(ticket) => {
            println!(
                "Updated {}: {} / {}",
                ticket.id,
                ticket.status.label(),
                ticket.priority.label()
            );
            Ok(())
        }
        Err(DeskError::Conflict(what)) => {
            bail!("{what} was changed by someone else; re-run to apply on top of the latest version")
        }
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListArgs {
    pub criteria: Criteria,
    pub sort: Option<Sort>,
    pub page: usize,
    pub page_size: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateArgs {
    pub id: String,
    pub patch: TicketPatch,
    pub if_unchanged: bool,
}

fn value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> Result<&'a str> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .with_context(|| format!("Missing value for {flag}"))
}

/// Comma-separated values, each normalised by `key`.
fn values(raw: &str, key: impl Fn(&str) -> Result<String>) -> Result<Vec<String>> {
    raw.split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(key)
        .collect()
}

/// A bare date covers the whole day: `since` starts at midnight and
/// `until` runs to the last second.
fn parse_date(raw: &str, end_of_day: bool) -> Result<DateTime<Utc>> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let time = if end_of_day {
            date.and_hms_opt(23, 59, 59)
        } else {
            date.and_hms_opt(0, 0, 0)
        };
        return time
            .map(|t| t.and_utc())
            .with_context(|| format!("Invalid date '{raw}'"));
    }
    Ok(parse_instant(raw)?)
}

/// Parse `list` / `articles` flags.
pub fn parse_list_args(args: &[String], default_page_size: usize) -> Result<ListArgs> {
    let mut criteria = Criteria::default();
    let mut sort: Option<Sort> = None;
    let mut ascending = false;
    let mut page = 1;
    let mut page_size = default_page_size;
    let mut i = 0;

    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--search" | "-s" => criteria.search = value(args, &mut i, flag)?.to_string(),
            "--status" => {
                let raw = value(args, &mut i, flag)?;
                criteria.statuses.extend(values(raw, |v| {
                    Ok(v.parse::<TicketStatus>()?.as_str().to_string())
                })?);
            }
            "--priority" => {
                let raw = value(args, &mut i, flag)?;
                criteria.priorities.extend(values(raw, |v| {
                    Ok(v.parse::<TicketPriority>()?.as_str().to_string())
                })?);
            }
            "--category" => {
                let raw = value(args, &mut i, flag)?;
                criteria.categories.extend(values(raw, |v| Ok(v.to_string()))?);
            }
            "--assignee" => {
                let raw = value(args, &mut i, flag)?;
                criteria.assignees.extend(values(raw, |v| Ok(v.to_string()))?);
            }
            "--tag" => {
                let raw = value(args, &mut i, flag)?;
                criteria.tags.extend(values(raw, |v| Ok(v.to_string()))?);
            }
            "--since" => criteria.created_from = Some(parse_date(value(args, &mut i, flag)?, false)?),
            "--until" => criteria.created_to = Some(parse_date(value(args, &mut i, flag)?, true)?),
            "--sort" => {
                let field = value(args, &mut i, flag)?
                    .parse::<SortField>()
                    .map_err(anyhow::Error::msg)?;
                sort = Some(Sort::new(field, SortDirection::Desc));
            }
            "--asc" => ascending = true,
            "--page" => {
                page = value(args, &mut i, flag)?
                    .parse()
                    .context("--page expects a number")?;
            }
            "--page-size" => {
                page_size = value(args, &mut i, flag)?
                    .parse()
                    .context("--page-size expects a number")?;
                if page_size == 0 {
                    bail!("--page-size must be at least 1");
                }
            }
            other => bail!("Unknown option '{other}'"),
        }
        i += 1;
    }

    if ascending {
        let field = sort.map(|s| s.field).unwrap_or_default();
        sort = Some(Sort::new(field, SortDirection::Asc));
    }

    Ok(ListArgs {
        criteria,
        sort,
        page,
        page_size,
    })
}

/// Parse `create` arguments. Words outside any flag form the title when
/// `--title` is not given.
pub fn parse_create_args(args: &[String]) -> Result<NewTicket> {
    let mut title: Option<String> = None;
    let mut title_parts: Vec<&str> = Vec::new();
    let mut ticket = NewTicket::default();
    let mut i = 0;

    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--title" | "-t" => title = Some(value(args, &mut i, flag)?.to_string()),
            "-d" | "--desc" | "--description" => {
                ticket.description = value(args, &mut i, flag)?.to_string();
            }
            "--category" => ticket.category = Some(value(args, &mut i, flag)?.to_string()),
            "--priority" => ticket.priority = Some(value(args, &mut i, flag)?.parse()?),
            "--requester" => ticket.requester = Some(value(args, &mut i, flag)?.to_string()),
            "--tag" => {
                let tag = value(args, &mut i, flag)?;
                if !ticket.add_tag(tag) && ticket.tags.len() >= MAX_NEW_TICKET_TAGS {
                    bail!("A ticket takes at most {MAX_NEW_TICKET_TAGS} tags");
                }
            }
            _ if flag.starts_with("--") => bail!("Unknown option '{flag}'"),
            _ => title_parts.push(flag),
        }
        i += 1;
    }

    ticket.title = title.unwrap_or_else(|| title_parts.join(" "));
    if ticket.title.trim().is_empty() {
        bail!("Usage: servicedesk create --title <title> [--description <text>] [--category <c>] [--priority <p>] [--tag <t>]...\n\nTicket title cannot be empty");
    }
    Ok(ticket)
}

/// Parse `update <id>` arguments. `--assignee none` unassigns.
pub fn parse_update_args(args: &[String]) -> Result<UpdateArgs> {
    let Some((id, rest)) = args.split_first() else {
        bail!("Usage: servicedesk update <id> [--status <s>] [--priority <p>] [--assignee <name|none>] [--if-unchanged]");
    };
    let mut patch = TicketPatch::default();
    let mut if_unchanged = false;
    let mut i = 0;

    while i < rest.len() {
        let flag = rest[i].as_str();
        match flag {
            "--status" => patch.status = Some(value(rest, &mut i, flag)?.parse()?),
            "--priority" => patch.priority = Some(value(rest, &mut i, flag)?.parse()?),
            "--title" => patch.title = Some(value(rest, &mut i, flag)?.to_string()),
            "--category" => patch.category = Some(value(rest, &mut i, flag)?.to_string()),
            "--assignee" => {
                let who = value(rest, &mut i, flag)?;
                patch.assignee = Some(match who {
                    "none" | "-" => None,
                    name => Some(name.to_string()),
                });
            }
            "--if-unchanged" => if_unchanged = true,
            other => bail!("Unknown option '{other}'"),
        }
        i += 1;
    }

    if patch.is_empty() {
        bail!("Nothing to update for {id}: pass --status, --priority, --title, --category or --assignee");
    }
    Ok(UpdateArgs {
        id: id.clone(),
        patch,
        if_unchanged,
    })
}

/// Parse `count [collection] [--status a,b] [--search text]`. Filters are
/// applied by the backend, not locally.
pub fn parse_count_args(args: &[String]) -> Result<(Collection, Vec<Filter>)> {
    let mut collection = Collection::Tickets;
    let mut statuses: Option<&str> = None;
    let mut search = None;
    let mut i = 0;

    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--status" => statuses = Some(value(args, &mut i, flag)?),
            "--search" => search = Some(value(args, &mut i, flag)?),
            _ if flag.starts_with("--") => bail!("Unknown option '{flag}'"),
            name => collection = name.parse().map_err(anyhow::Error::msg)?,
        }
        i += 1;
    }

    let mut filters = Vec::new();
    if let Some(raw) = statuses {
        // Ticket statuses are stored in canonical form; other collections
        // keep their own vocabulary.
        let list = if collection == Collection::Tickets {
            values(raw, |v| Ok(v.parse::<TicketStatus>()?.as_str().to_string()))?
        } else {
            values(raw, |v| Ok(v.to_string()))?
        };
        filters.push(Filter::In("status".into(), list));
    }
    if let Some(text) = search {
        filters.push(Filter::Contains("title".into(), text.to_string()));
    }
    Ok((collection, filters))
}

/// Parse `login <email> [name] [--role <role>]` into a local session and
/// its bearer token.
pub fn parse_login_args(args: &[String]) -> Result<(Session, String)> {
    let mut role = Role::default();
    let mut positional: Vec<&str> = Vec::new();
    let mut i = 0;

    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--role" => role = value(args, &mut i, flag)?.parse().map_err(anyhow::Error::msg)?,
            _ => positional.push(flag),
        }
        i += 1;
    }

    let Some((email, name)) = positional.split_first() else {
        bail!("Usage: servicedesk login <email> [name] [--role admin|agent|customer]");
    };
    if !email.contains('@') {
        bail!("'{email}' is not an email address");
    }
    let session = Session::new(*email, name.join(" "), role);
    let token = format!("local-{}", uuid::Uuid::new_v4());
    Ok((session, token))
}

pub fn print_help() {
    println!("servicedesk — terminal client for the service desk\n");
    println!("USAGE:");
    println!("  servicedesk                     Launch the ticket board");
    println!("  servicedesk list [options]      List tickets");
    println!("  servicedesk create <title>      Open a ticket");
    println!("  servicedesk update <id> ...     Change status, priority or assignee");
    println!("  servicedesk delete <id>         Delete a ticket");
    println!("  servicedesk articles [options]  List knowledge base articles");
    println!("  servicedesk accounts            List accounts");
    println!("  servicedesk count [collection] [--status a,b] [--search text]");
    println!("  servicedesk login <email> [name] [--role r]");
    println!("  servicedesk logout | whoami");
    println!();
    println!("LIST OPTIONS:");
    println!("  --search <text>        Match title, description or id");
    println!("  --status <a,b>         Any of the given statuses");
    println!("  --priority <a,b>       Any of the given priorities");
    println!("  --category, --assignee, --tag <a,b>");
    println!("  --since, --until <YYYY-MM-DD>");
    println!("  --sort <created|updated|priority|status|title> [--asc]");
    println!("  --page <n>  --page-size <n>");
    println!();
    println!("CREATE OPTIONS:");
    println!("  -d, --description <text>  --category <c>  --priority <p>  --tag <t> (up to {MAX_NEW_TICKET_TAGS})");
    println!();
    println!("UPDATE OPTIONS:");
    println!("  --status <s>  --priority <p>  --title <t>  --category <c>  --assignee <name|none>");
    println!("  --if-unchanged   Refuse if the ticket changed since it was read");
}
