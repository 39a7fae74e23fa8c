use anyhow::Result;
use ratatui::backend::Backend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols::line::NORMAL as LINE;
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use tui_widgets::popup::Popup;

use crate::config::RgbColor;
use crate::contact::{Contact, Field};
use crate::photo;
use crate::view::FilterMode;

use super::app::{App, PathPurpose};
use super::form::{AuthField, FORM_FIELDS};

const SEARCH_HELP: &str = "Type to filter  Enter: close  Esc: clear";
const FORM_HELP: &str = "Tab/Down: next  BackTab/Up: prev  Space: toggle star  F2: save  Esc: cancel";
const AUTH_HELP: &str = "Tab: next field  Enter: submit  F3: switch sign in/register  Esc: quit";
const CONFIRM_HELP: &str = "Y/Enter: confirm  N/Esc: cancel";
const MERGE_HELP: &str = "Y/Enter: merge  N: keep both  C/Esc: cancel";
const PATH_HELP: &str = "Enter: run  Esc: cancel";
const HELP_MODAL_FOOTER: &str = "j/k: scroll  Esc/q: close";
const LABEL_WIDTH: usize = 20;

pub fn render<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    terminal.draw(|frame| draw_frame(frame, app))?;
    Ok(())
}

fn draw_frame(frame: &mut Frame<'_>, app: &mut App) {
    let size = frame.area();
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(size);

    draw_header(frame, layout[0], app);
    draw_body(frame, layout[1], app);
    draw_footer(frame, layout[2], app);
    draw_form_modal(frame, size, app);
    draw_auth_modal(frame, size, app);
    draw_confirm_modal(frame, size, app);
    draw_merge_modal(frame, size, app);
    draw_path_prompt(frame, size, app);
    draw_help_modal(frame, size, app);
    draw_busy_modal(frame, size, app);
}

fn draw_header(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let style = header_text_style(app);
    let state = app.store.view_state();
    let mut spans = vec![Span::styled("CBOOK", style.add_modifier(Modifier::BOLD))];

    if let Some(user) = app.user_label() {
        spans.push(Span::raw("   "));
        spans.push(Span::styled(user, style));
    }
    spans.push(Span::raw("   "));
    spans.push(Span::styled(
        format!("sort: {} ({})", state.sort, state.direction),
        style,
    ));
    if state.filter == FilterMode::Starred {
        spans.push(Span::raw("   "));
        spans.push(Span::styled("STARRED ONLY", selection_style(app)));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_body(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);
    draw_list(frame, chunks[0], app);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(8)])
        .split(chunks[1]);
    draw_details(frame, right[0], app);
    draw_recent(frame, right[1], app);
}

// ============================================================================
// Contact list
// ============================================================================

fn draw_list(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let view = app.store.view();
    let title = format!(
        " CONTACTS {} / page {} of {} ",
        view.filtered_count(),
        view.page,
        view.total_pages.max(1)
    );
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(app))
        .title(Span::styled(title, header_text_style(app)));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.width == 0 || inner.height == 0 {
        return;
    }

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(2), Constraint::Min(0)])
        .split(inner);
    draw_search_header(frame, layout[0], app, area.width);

    if view.visible.is_empty() {
        let message = if app.store.contacts().is_empty() {
            "No contacts yet. Press a to add one."
        } else {
            "No contacts found."
        };
        frame.render_widget(
            Paragraph::new(message).style(header_text_style(app)),
            layout[1],
        );
        return;
    }

    let selected_id = app.store.selected().map(|c| c.id.clone());
    let mut items: Vec<ListItem> = Vec::new();
    let mut selected_item = None;
    for group in &view.groups {
        items.push(ListItem::new(Line::from(Span::styled(
            format!("{} {} ", LINE.horizontal, group.initial),
            separator_style(app),
        ))));
        for contact in &group.contacts {
            if selected_id.as_deref() == Some(contact.id.as_str()) {
                selected_item = Some(items.len());
            }
            items.push(contact_item(contact, app));
        }
    }

    let mut state = ListState::default();
    state.select(selected_item);
    let list = List::new(items)
        .highlight_style(selection_style(app))
        .highlight_symbol(" ");
    frame.render_stateful_widget(list, layout[1], &mut state);
}

fn contact_item(contact: &Contact, app: &App) -> ListItem<'static> {
    let star = if contact.starred { "*" } else { " " };
    let mut spans = vec![
        Span::styled(star.to_string(), star_style(app)),
        Span::raw(" "),
        Span::raw(contact.display_name().to_string()),
    ];
    if !contact.phone.is_empty() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            contact.phone.clone(),
            Style::default().add_modifier(Modifier::DIM),
        ));
    }
    if app.is_last_saved(contact) {
        spans.push(Span::styled("  saved", star_style(app)));
    }
    ListItem::new(Line::from(spans))
}

fn draw_search_header(frame: &mut Frame<'_>, area: Rect, app: &App, outer_width: u16) {
    if area.width == 0 || area.height == 0 {
        return;
    }

    let label = "SEARCH: ";
    let value_style = if app.search_active {
        selection_style(app)
    } else {
        Style::default()
    };
    let line = Line::from(vec![
        Span::styled(label, header_text_style(app)),
        Span::styled(app.search_input.value().to_string(), value_style),
    ]);
    frame.render_widget(Paragraph::new(line), Rect { height: 1, ..area });

    if app.search_active && !modal_open(app) {
        let column = Span::raw(label).width() + app.search_input.visual_cursor();
        frame.set_cursor_position((area.x.saturating_add(column as u16), area.y));
    }

    if area.height > 1 {
        let separator = format!(
            "{}{}{}",
            LINE.vertical_right,
            LINE.horizontal
                .repeat(outer_width.saturating_sub(2) as usize),
            LINE.vertical_left
        );
        let separator_area = Rect {
            x: area.x.saturating_sub(1),
            y: area.y + 1,
            width: outer_width,
            height: 1,
        };
        frame.render_widget(
            Paragraph::new(Span::styled(separator, separator_style(app))),
            separator_area,
        );
    }
}

// ============================================================================
// Detail and recent panes
// ============================================================================

fn draw_details(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(app))
        .title(Span::styled(" DETAILS ", header_text_style(app)));

    let Some(contact) = app.store.selected() else {
        let paragraph = Paragraph::new("No contact selected")
            .style(header_text_style(app))
            .block(block);
        frame.render_widget(paragraph, area);
        return;
    };

    let label_style = header_text_style(app);
    let mut lines = vec![Line::from(Span::styled(
        contact.display_name().to_string(),
        Style::default().add_modifier(Modifier::BOLD),
    ))];
    if contact.starred {
        lines.push(Line::from(Span::styled("* starred", star_style(app))));
    }
    lines.push(Line::from(""));

    let mut push = |label: &str, value: &str| {
        if !value.is_empty() {
            lines.push(Line::from(vec![
                Span::styled(format!("{:<10}", label), label_style),
                Span::raw(value.to_string()),
            ]));
        }
    };
    push("Phone", &contact.phone);
    push("Email", &contact.email);
    push("Company", &contact.company);
    push("Title", &contact.job_title);
    push("Address", &contact.address);
    for link in &contact.social_media {
        push("Link", link);
    }
    if !contact.profile_picture.is_empty() {
        push("Picture", &photo::describe(&contact.profile_picture));
    }
    if !contact.notes.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled("Notes", label_style)));
        lines.extend(contact.notes.lines().map(|l| Line::from(l.to_string())));
    }

    let paragraph = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(block);
    frame.render_widget(paragraph, area);
}

fn draw_recent(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let view = app.store.view();
    let items: Vec<ListItem> = if view.recent.is_empty() {
        vec![ListItem::new("Nothing added yet")]
    } else {
        view.recent.iter().map(|c| contact_item(c, app)).collect()
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(app))
        .title(Span::styled(" RECENTLY ADDED ", header_text_style(app)));
    frame.render_widget(List::new(items).block(block), area);
}

fn draw_footer(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let colors = app.ui_colors();
    let mut style = Style::default()
        .fg(color(colors.status_fg))
        .bg(color(colors.status_bg));

    let message = if app.auth.is_some() {
        AUTH_HELP.to_string()
    } else if app.form.is_some() {
        FORM_HELP.to_string()
    } else if app.search_active {
        SEARCH_HELP.to_string()
    } else {
        match &app.status {
            Some(status) => {
                if status.error {
                    style = style.fg(color(colors.error));
                }
                status.text.clone()
            }
            None => "READY  ?: help".to_string(),
        }
    };

    let background = Block::default().style(Style::default().bg(color(colors.status_bg)));
    frame.render_widget(background, area);
    frame.render_widget(Paragraph::new(message).style(style), area);
}

// ============================================================================
// Modals
// ============================================================================

fn modal_open(app: &App) -> bool {
    app.form.is_some()
        || app.auth.is_some()
        || app.confirm_modal.is_some()
        || app.path_prompt.is_some()
        || app.help_modal.is_some()
        || app.busy_modal.is_some()
        || app.store.pending_merge().is_some()
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

fn modal_block(app: &App, title: &str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(app))
        .title(Span::styled(format!(" {} ", title), header_text_style(app)))
        .title_alignment(Alignment::Center)
}

fn draw_form_modal(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let Some(form) = app.form.as_ref() else {
        return;
    };
    // Nested modals draw on top and own the cursor.
    let on_top = app.store.pending_merge().is_none() && app.busy_modal.is_none();

    let width = area.width.saturating_mul(3).saturating_div(4).max(50);
    let height = FORM_FIELDS.len() as u16 + 2;
    let modal_area = centered(area, width, height);
    frame.render_widget(Clear, modal_area);

    let block = modal_block(app, form.title());
    let inner = block.inner(modal_area);
    frame.render_widget(block, modal_area);

    let mut lines = Vec::new();
    let mut cursor = None;
    for (index, field) in FORM_FIELDS.iter().enumerate() {
        let focused = index == form.focus;
        let label = format!("{:<width$}", field.label(), width = LABEL_WIDTH);
        let label_style = if focused {
            selection_style(app)
        } else {
            header_text_style(app)
        };

        let value = if *field == Field::Starred {
            let mark = if form.starred { "[x]" } else { "[ ]" };
            mark.to_string()
        } else {
            form.value(*field).to_string()
        };
        let mut spans = vec![
            Span::styled(label, label_style),
            Span::raw(" "),
            Span::raw(value),
        ];
        if let Some(message) = form.error_for(*field) {
            spans.push(Span::styled(format!("  {}", message), error_style(app)));
        }
        lines.push(Line::from(spans));

        if focused && *field != Field::Starred {
            let offset = form
                .rows
                .get(index)
                .map(|row| row.input.visual_cursor())
                .unwrap_or(0);
            cursor = Some((
                inner.x + (LABEL_WIDTH + 1 + offset) as u16,
                inner.y + index as u16,
            ));
        }
    }
    frame.render_widget(Paragraph::new(lines), inner);

    if let (Some(position), true) = (cursor, on_top) {
        frame.set_cursor_position(position);
    }
}

fn draw_auth_modal(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let Some(auth) = app.auth.as_ref() else {
        return;
    };

    let fields = auth.fields();
    let height = fields.len() as u16 + 5;
    let modal_area = centered(area, 60, height);
    frame.render_widget(Clear, modal_area);

    let title = if auth.register { "CREATE ACCOUNT" } else { "SIGN IN" };
    let block = modal_block(app, title);
    let inner = block.inner(modal_area);
    frame.render_widget(block, modal_area);

    let label_width = 10usize;
    let mut lines = Vec::new();
    let mut cursor = None;
    for (index, field) in fields.iter().enumerate() {
        let focused = *field == auth.focused();
        let input = auth.input(*field);
        let shown = if *field == AuthField::Password {
            "*".repeat(input.value().chars().count())
        } else {
            input.value().to_string()
        };
        let label_style = if focused {
            selection_style(app)
        } else {
            header_text_style(app)
        };
        lines.push(Line::from(vec![
            Span::styled(format!("{:<width$}", field.label(), width = label_width), label_style),
            Span::raw(" "),
            Span::raw(shown),
        ]));
        if focused {
            cursor = Some((
                inner.x + (label_width + 1 + input.visual_cursor()) as u16,
                inner.y + index as u16,
            ));
        }
    }
    lines.push(Line::from(""));
    if let Some(message) = &auth.message {
        lines.push(Line::from(Span::styled(message.clone(), error_style(app))));
    }
    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);

    if let (Some(position), None) = (cursor, app.busy_modal.as_ref()) {
        frame.set_cursor_position(position);
    }
}

fn draw_confirm_modal(frame: &mut Frame<'_>, area: Rect, app: &mut App) {
    let Some(modal) = app.confirm_modal.as_ref() else {
        return;
    };

    let body = Text::from(vec![
        Line::from(modal.message.clone()),
        Line::from(""),
        Line::from(CONFIRM_HELP),
    ]);
    let title = Line::from(Span::styled(modal.title.clone(), header_text_style(app)));
    let popup = Popup::new(body)
        .title(title)
        .border_style(border_style(app));

    frame.render_stateful_widget_ref(popup, area, &mut app.modal_popup);
}

fn draw_merge_modal(frame: &mut Frame<'_>, area: Rect, app: &mut App) {
    let Some(proposal) = app.store.pending_merge() else {
        return;
    };

    let target = &proposal.target;
    let merged = proposal.preview();
    let label = header_text_style(app);
    let mut lines = vec![
        Line::from(format!(
            "A contact with phone {} already exists.",
            target.phone
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled(format!("{:<10}", "Existing"), label),
            Span::raw(summary(target)),
        ]),
        Line::from(vec![
            Span::styled(format!("{:<10}", "Merged"), label),
            Span::raw(summary(&merged)),
        ]),
    ];
    if proposal.editing_id.is_some() {
        lines.push(Line::from(Span::styled(
            "Merging removes the contact being edited.",
            error_style(app),
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(MERGE_HELP));

    let title = Line::from(Span::styled("DUPLICATE PHONE", label));
    let popup = Popup::new(Text::from(lines))
        .title(title)
        .border_style(border_style(app));

    frame.render_stateful_widget_ref(popup, area, &mut app.modal_popup);
}

fn summary(contact: &Contact) -> String {
    [
        contact.display_name(),
        contact.email.as_str(),
        contact.company.as_str(),
    ]
    .iter()
    .filter(|part| !part.is_empty())
    .copied()
    .collect::<Vec<_>>()
    .join(", ")
}

fn draw_path_prompt(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let Some(prompt) = app.path_prompt.as_ref() else {
        return;
    };

    let modal_area = centered(area, area.width.saturating_mul(2).saturating_div(3).max(40), 5);
    frame.render_widget(Clear, modal_area);
    let block = modal_block(app, prompt.title());
    let inner = block.inner(modal_area);
    frame.render_widget(block, modal_area);

    let label = match prompt.purpose {
        PathPurpose::Import => "From: ",
        PathPurpose::Export => "To:   ",
    };
    let lines = vec![
        Line::from(vec![
            Span::styled(label, header_text_style(app)),
            Span::raw(prompt.input.value().to_string()),
        ]),
        Line::from(""),
        Line::from(Span::styled(PATH_HELP, separator_style(app))),
    ];
    frame.render_widget(Paragraph::new(lines), inner);

    if app.busy_modal.is_none() {
        let column = label.len() + prompt.input.visual_cursor();
        frame.set_cursor_position((inner.x + column as u16, inner.y));
    }
}

fn draw_help_modal(frame: &mut Frame<'_>, area: Rect, app: &mut App) {
    if app.help_modal.is_none() {
        return;
    }

    let width = area.width.saturating_mul(2).saturating_div(3).max(40).min(area.width);
    let height = area.height.saturating_mul(4).saturating_div(5).max(10).min(area.height);
    let modal_area = centered(area, width, height);
    frame.render_widget(Clear, modal_area);

    let header_style = header_text_style(app);
    let border = border_style(app);
    let content_width = width.saturating_sub(4) as usize;

    let sections = app.help_entries();
    let mut lines: Vec<Line> = Vec::new();
    for (index, section) in sections.iter().enumerate() {
        let heading = format!(" {} ", section.title);
        let padding = content_width.saturating_sub(heading.len());
        let left = padding / 2;
        lines.push(Line::from(Span::styled(
            format!(
                "{}{}{}",
                LINE.horizontal.repeat(left),
                heading,
                LINE.horizontal.repeat(padding - left)
            ),
            header_style,
        )));
        for entry in &section.entries {
            lines.push(Line::from(vec![
                Span::raw(format!("{:<20}", entry.action)),
                Span::styled(entry.keys.clone(), header_style),
            ]));
        }
        if index + 1 < sections.len() {
            lines.push(Line::from(""));
        }
    }

    let total_lines = lines.len();
    let viewport = height.saturating_sub(2) as usize;
    let Some(modal) = app.help_modal.as_mut() else {
        return;
    };
    modal.total_lines = total_lines;
    modal.viewport_height = viewport;
    modal.scroll = modal.scroll.min(total_lines.saturating_sub(viewport));

    let indicator = match (modal.can_scroll_up(), modal.can_scroll_down()) {
        (true, true) => "▲▼",
        (true, false) => "▲ ",
        (false, true) => " ▼",
        (false, false) => "  ",
    };
    let visible: Vec<Line> = lines.into_iter().skip(modal.scroll).take(viewport).collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border)
        .title(Line::from(vec![
            Span::styled(" HELP ", header_style),
            Span::styled(indicator, header_style),
        ]))
        .title_bottom(Line::from(Span::styled(
            format!(" {} ", HELP_MODAL_FOOTER),
            header_style,
        )))
        .title_alignment(Alignment::Center);
    let inner = block.inner(modal_area);
    frame.render_widget(block, modal_area);
    frame.render_widget(Paragraph::new(visible), inner);
}

fn draw_busy_modal(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let Some(modal) = &app.busy_modal else {
        return;
    };

    let modal_area = centered(area, 30, 3);
    frame.render_widget(Clear, modal_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(app));
    let inner = block.inner(modal_area);
    frame.render_widget(block, modal_area);

    let text = Paragraph::new(modal.message.clone())
        .alignment(Alignment::Center)
        .style(header_text_style(app));
    frame.render_widget(text, inner);
}

// ============================================================================
// Styles
// ============================================================================

fn selection_style(app: &App) -> Style {
    let colors = app.ui_colors();
    Style::default()
        .fg(color(colors.selection_fg))
        .bg(color(colors.selection_bg))
}

fn border_style(app: &App) -> Style {
    Style::default().fg(color(app.ui_colors().border))
}

fn header_text_style(app: &App) -> Style {
    Style::default().fg(color(app.ui_colors().separator))
}

fn separator_style(app: &App) -> Style {
    Style::default().fg(color(app.ui_colors().separator))
}

fn star_style(app: &App) -> Style {
    Style::default().fg(color(app.ui_colors().star))
}

fn error_style(app: &App) -> Style {
    Style::default().fg(color(app.ui_colors().error))
}

fn color(rgb: RgbColor) -> Color {
    Color::Rgb(rgb.r, rgb.g, rgb.b)
}
