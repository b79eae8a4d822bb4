//! Embedded JavaScript analysis
//!
//! Template expressions, binding patterns and `{@const}` declarations are parsed with
//! oxc. One scope-aware pass collects what the rewriters need: free identifier
//! references, `$store` access sites, call sites, and the names a pattern binds.

use oxc_allocator::Allocator;
use oxc_ast::ast::*;
use oxc_ast_visit::walk::{
    walk_arrow_function_expression, walk_assignment_expression, walk_assignment_target,
    walk_block_statement, walk_call_expression, walk_catch_clause, walk_for_in_statement, walk_for_of_statement,
    walk_for_statement, walk_function, walk_object_property, walk_program,
    walk_update_expression,
};
use oxc_ast_visit::Visit;
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType};
use oxc_syntax::scope::ScopeFlags;
use std::collections::HashSet;

use crate::stores::{is_store_name, StoreAccess, StoreSite};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsKind {
    /// `{expr}`, attribute values, block tests.
    Expression,
    /// Each context, await value/error, `let:` targets.
    Pattern,
    /// `{@const x = y}`.
    Declaration,
}

/// Syntax error inside embedded JS, in absolute source offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxIssue {
    pub message: String,
    pub start: u32,
    pub end: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub name: String,
    pub start: u32,
    pub end: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    pub callee: String,
    /// First argument when it is a string literal.
    pub event: Option<String>,
    pub start: u32,
    pub end: u32,
}

#[derive(Debug, Clone, Default)]
pub struct Analysis {
    /// Identifier references not bound inside the fragment itself.
    pub references: Vec<Reference>,
    pub stores: Vec<StoreSite>,
    pub calls: Vec<CallSite>,
    /// Names bound by a pattern or declaration, in source order.
    pub bindings: Vec<Reference>,
}

impl Analysis {
    pub fn binding_names(&self) -> Vec<String> {
        self.bindings.iter().map(|b| b.name.clone()).collect()
    }

    pub fn references_name(&self, name: &str) -> bool {
        self.references.iter().any(|r| r.name == name)
    }
}

pub fn source_type() -> SourceType {
    SourceType::default()
        .with_typescript(true)
        .with_module(true)
}

/// Parse and analyze the JS at `[base, base + text.len())`.
pub fn analyze(text: &str, base: u32, kind: JsKind) -> Result<Analysis, SyntaxIssue> {
    let allocator = Allocator::default();
    match kind {
        JsKind::Expression => {
            let expr = Parser::new(&allocator, text, source_type())
                .parse_expression()
                .map_err(|errors| issue_from(&errors, text, base, 0))?;
            let mut analyzer = Analyzer::new(base, 0);
            analyzer.visit_expression(&expr);
            Ok(analyzer.out)
        }
        JsKind::Pattern => {
            let wrapped = format!("({}) => {{}}", text);
            let prefix = 1;
            let expr = Parser::new(&allocator, &wrapped, source_type())
                .parse_expression()
                .map_err(|errors| issue_from(&errors, text, base, prefix))?;
            let Expression::ArrowFunctionExpression(arrow) = &expr else {
                return Err(whole_issue("Expected a binding pattern", text, base));
            };
            if arrow.params.items.len() != 1 || arrow.params.rest.is_some() {
                return Err(whole_issue("Expected a single binding pattern", text, base));
            }
            let mut analyzer = Analyzer::new(base, prefix);
            for param in &arrow.params.items {
                analyzer.collect_bindings(&param.pattern);
            }
            analyzer.visit_arrow_function_expression(arrow);
            Ok(analyzer.out)
        }
        JsKind::Declaration => {
            let wrapped = format!("let {};", text);
            let prefix = 4;
            let ret = Parser::new(&allocator, &wrapped, source_type()).parse();
            if !ret.errors.is_empty() {
                return Err(issue_from(&ret.errors, text, base, prefix));
            }
            let [Statement::VariableDeclaration(decl)] = ret.program.body.as_slice() else {
                return Err(whole_issue("Expected a single declaration", text, base));
            };
            let mut analyzer = Analyzer::new(base, prefix);
            for declarator in &decl.declarations {
                analyzer.collect_bindings(&declarator.id);
            }
            analyzer.visit_program(&ret.program);
            Ok(analyzer.out)
        }
    }
}

fn whole_issue(message: &str, text: &str, base: u32) -> SyntaxIssue {
    SyntaxIssue {
        message: message.to_string(),
        start: base,
        end: base + text.len() as u32,
    }
}

fn issue_from(
    errors: &[oxc_diagnostics::OxcDiagnostic],
    text: &str,
    base: u32,
    prefix: u32,
) -> SyntaxIssue {
    let Some(first) = errors.first() else {
        return whole_issue("Invalid expression", text, base);
    };
    let len = text.len() as u32;
    let (start, end) = first
        .labels
        .as_ref()
        .and_then(|labels| labels.first())
        .map(|label| {
            let start = (label.offset() as u32).saturating_sub(prefix).min(len);
            let end = (start + label.len() as u32).min(len);
            (start, end)
        })
        .unwrap_or((0, len));
    SyntaxIssue {
        message: first.message.to_string(),
        start: base + start,
        end: base + end.max(start),
    }
}

/// Same-length stand-in for an expression that does not parse. Line breaks survive.
pub fn expression_filler(text: &str) -> String {
    filler(text, "0")
}

/// Same-length stand-in for a pattern that does not parse.
pub fn pattern_filler(text: &str) -> String {
    if text.len() >= 3 {
        filler(text, "$$_")
    } else {
        filler(text, "_")
    }
}

fn filler(text: &str, lead: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut lead = lead.chars();
    for ch in text.chars() {
        if ch == '\n' || ch == '\r' {
            out.push(ch);
            continue;
        }
        for _ in 0..ch.len_utf8() {
            out.push(lead.next().unwrap_or(' '));
        }
    }
    out
}

/// Names a statement list declares at its own level (imports, let/const/var,
/// functions, classes).
pub fn declared_names(statements: &[Statement<'_>]) -> Vec<String> {
    let mut names = Vec::new();
    for statement in statements {
        match statement {
            Statement::VariableDeclaration(decl) => push_declaration_names(decl, &mut names),
            Statement::FunctionDeclaration(func) => {
                if let Some(id) = &func.id {
                    names.push(id.name.to_string());
                }
            }
            Statement::ClassDeclaration(class) => {
                if let Some(id) = &class.id {
                    names.push(id.name.to_string());
                }
            }
            Statement::ImportDeclaration(import) => {
                for specifier in import.specifiers.iter().flatten() {
                    names.push(specifier.local().name.to_string());
                }
            }
            Statement::ExportNamedDeclaration(export) => match &export.declaration {
                Some(Declaration::VariableDeclaration(decl)) => {
                    push_declaration_names(decl, &mut names)
                }
                Some(Declaration::FunctionDeclaration(func)) => {
                    if let Some(id) = &func.id {
                        names.push(id.name.to_string());
                    }
                }
                Some(Declaration::ClassDeclaration(class)) => {
                    if let Some(id) = &class.id {
                        names.push(id.name.to_string());
                    }
                }
                _ => {}
            },
            _ => {}
        }
    }
    names
}

fn push_declaration_names(decl: &VariableDeclaration<'_>, names: &mut Vec<String>) {
    for declarator in &decl.declarations {
        for id in declarator.id.get_binding_identifiers() {
            names.push(id.name.to_string());
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ANALYZER
// ═══════════════════════════════════════════════════════════════════════════════

/// Scope-aware collector shared by template expressions and the instance script.
pub struct Analyzer {
    base: u32,
    prefix: u32,
    scopes: Vec<HashSet<String>>,
    pub out: Analysis,
}

impl Analyzer {
    /// `base` is the absolute offset of the analyzed text; `prefix` the length of
    /// any wrapper text in front of it.
    pub fn new(base: u32, prefix: u32) -> Self {
        Analyzer {
            base,
            prefix,
            scopes: Vec::new(),
            out: Analysis::default(),
        }
    }

    fn abs(&self, pos: u32) -> u32 {
        (self.base + pos).saturating_sub(self.prefix)
    }

    fn push_scope(&mut self, names: impl IntoIterator<Item = String>) {
        self.scopes.push(names.into_iter().collect());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn is_local(&self, name: &str) -> bool {
        self.scopes.iter().rev().any(|scope| scope.contains(name))
    }

    fn collect_bindings(&mut self, pattern: &BindingPattern<'_>) {
        for id in pattern.get_binding_identifiers() {
            let reference = Reference {
                name: id.name.to_string(),
                start: self.abs(id.span.start),
                end: self.abs(id.span.end),
            };
            self.out.bindings.push(reference);
        }
    }

    fn param_names(params: &FormalParameters<'_>) -> Vec<String> {
        let mut names: Vec<String> = params
            .items
            .iter()
            .flat_map(|p| p.pattern.get_binding_identifiers())
            .map(|id| id.name.to_string())
            .collect();
        if let Some(rest) = &params.rest {
            names.extend(
                rest.rest
                    .argument
                    .get_binding_identifiers()
                    .into_iter()
                    .map(|id| id.name.to_string()),
            );
        }
        names
    }

    fn record_reference(&mut self, ident: &IdentifierReference<'_>) -> bool {
        let name = ident.name.as_str();
        if self.is_local(name) {
            return false;
        }
        self.out.references.push(Reference {
            name: name.to_string(),
            start: self.abs(ident.span.start),
            end: self.abs(ident.span.end),
        });
        is_store_name(name)
    }

    fn store_site(&self, ident: &IdentifierReference<'_>, access: StoreAccess) -> StoreSite {
        StoreSite {
            name: ident.name.as_str()[1..].to_string(),
            start: self.abs(ident.span.start),
            end: self.abs(ident.span.end),
            access,
        }
    }
}

impl<'a> Visit<'a> for Analyzer {
    fn visit_program(&mut self, it: &Program<'a>) {
        self.push_scope(declared_names(&it.body));
        walk_program(self, it);
        self.pop_scope();
    }

    fn visit_function(&mut self, it: &Function<'a>, flags: ScopeFlags) {
        let mut names = Self::param_names(&it.params);
        if let Some(id) = &it.id {
            names.push(id.name.to_string());
        }
        if let Some(body) = &it.body {
            names.extend(declared_names(&body.statements));
        }
        self.push_scope(names);
        walk_function(self, it, flags);
        self.pop_scope();
    }

    fn visit_arrow_function_expression(&mut self, it: &ArrowFunctionExpression<'a>) {
        let mut names = Self::param_names(&it.params);
        names.extend(declared_names(&it.body.statements));
        self.push_scope(names);
        walk_arrow_function_expression(self, it);
        self.pop_scope();
    }

    fn visit_block_statement(&mut self, it: &BlockStatement<'a>) {
        self.push_scope(declared_names(&it.body));
        walk_block_statement(self, it);
        self.pop_scope();
    }

    fn visit_for_statement(&mut self, it: &ForStatement<'a>) {
        let names = match &it.init {
            Some(ForStatementInit::VariableDeclaration(decl)) => {
                let mut names = Vec::new();
                push_declaration_names(decl, &mut names);
                names
            }
            _ => Vec::new(),
        };
        self.push_scope(names);
        walk_for_statement(self, it);
        self.pop_scope();
    }

    fn visit_for_of_statement(&mut self, it: &ForOfStatement<'a>) {
        let mut names = Vec::new();
        if let ForStatementLeft::VariableDeclaration(decl) = &it.left {
            push_declaration_names(decl, &mut names);
        }
        self.push_scope(names);
        walk_for_of_statement(self, it);
        self.pop_scope();
    }

    fn visit_for_in_statement(&mut self, it: &ForInStatement<'a>) {
        let mut names = Vec::new();
        if let ForStatementLeft::VariableDeclaration(decl) = &it.left {
            push_declaration_names(decl, &mut names);
        }
        self.push_scope(names);
        walk_for_in_statement(self, it);
        self.pop_scope();
    }

    fn visit_catch_clause(&mut self, it: &CatchClause<'a>) {
        let names = it
            .param
            .as_ref()
            .map(|param| {
                param
                    .pattern
                    .get_binding_identifiers()
                    .into_iter()
                    .map(|id| id.name.to_string())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        self.push_scope(names);
        walk_catch_clause(self, it);
        self.pop_scope();
    }

    fn visit_identifier_reference(&mut self, it: &IdentifierReference<'a>) {
        if self.record_reference(it) {
            let site = self.store_site(it, StoreAccess::Read);
            self.out.stores.push(site);
        }
    }

    fn visit_object_property(&mut self, it: &ObjectProperty<'a>) {
        if it.shorthand {
            if let Expression::Identifier(ident) = &it.value {
                if self.record_reference(ident) {
                    let site = self.store_site(ident, StoreAccess::ShorthandRead);
                    self.out.stores.push(site);
                }
                return;
            }
        }
        walk_object_property(self, it);
    }

    fn visit_assignment_expression(&mut self, it: &AssignmentExpression<'a>) {
        match &it.left {
            AssignmentTarget::AssignmentTargetIdentifier(ident) => {
                if self.record_reference(ident) {
                    let right = it.right.span();
                    let access = if it.operator == AssignmentOperator::Assign {
                        StoreAccess::Assign {
                            right_start: self.abs(right.start),
                            right_end: self.abs(right.end),
                        }
                    } else {
                        StoreAccess::Compound {
                            operator: it.operator.as_str().trim_end_matches('=').to_string(),
                            right_start: self.abs(right.start),
                            right_end: self.abs(right.end),
                        }
                    };
                    let site = self.store_site(ident, access);
                    // Stores in `right` are rewritten first; this site is recorded last.
                    self.visit_expression(&it.right);
                    self.out.stores.push(site);
                    return;
                }
                self.visit_expression(&it.right);
            }
            _ => walk_assignment_expression(self, it),
        }
    }

    // Bare identifiers only reach here inside a destructuring pattern or a
    // `for (x of ...)` head; plain `x = ...` is handled above.
    fn visit_assignment_target(&mut self, it: &AssignmentTarget<'a>) {
        if let AssignmentTarget::AssignmentTargetIdentifier(ident) = it {
            if self.record_reference(ident) {
                let site = self.store_site(ident, StoreAccess::Target { shorthand: false });
                self.out.stores.push(site);
            }
            return;
        }
        walk_assignment_target(self, it);
    }

    fn visit_assignment_target_property_identifier(
        &mut self,
        it: &AssignmentTargetPropertyIdentifier<'a>,
    ) {
        if self.record_reference(&it.binding) {
            let site = self.store_site(&it.binding, StoreAccess::Target { shorthand: true });
            self.out.stores.push(site);
        }
        if let Some(init) = &it.init {
            self.visit_expression(init);
        }
    }

    fn visit_update_expression(&mut self, it: &UpdateExpression<'a>) {
        if let SimpleAssignmentTarget::AssignmentTargetIdentifier(ident) = &it.argument {
            if self.record_reference(ident) {
                let operator = match it.operator {
                    UpdateOperator::Increment => "+",
                    UpdateOperator::Decrement => "-",
                };
                let access = StoreAccess::Update {
                    operator: operator.to_string(),
                    prefix: it.prefix,
                    expr_start: self.abs(it.span.start),
                    expr_end: self.abs(it.span.end),
                };
                let site = self.store_site(ident, access);
                self.out.stores.push(site);
            }
            return;
        }
        walk_update_expression(self, it);
    }

    fn visit_call_expression(&mut self, it: &CallExpression<'a>) {
        if let Expression::Identifier(callee) = &it.callee {
            if !self.is_local(callee.name.as_str()) {
                let event = match it.arguments.first() {
                    Some(Argument::StringLiteral(lit)) => Some(lit.value.to_string()),
                    _ => None,
                };
                self.out.calls.push(CallSite {
                    callee: callee.name.to_string(),
                    event,
                    start: self.abs(it.span.start),
                    end: self.abs(it.span.end),
                });
            }
        }
        walk_call_expression(self, it);
    }

    // Type positions never hold runtime references worth rewriting.
    fn visit_ts_type(&mut self, _it: &TSType<'a>) {}

    fn visit_ts_type_annotation(&mut self, _it: &TSTypeAnnotation<'a>) {}

    fn visit_ts_type_parameter_instantiation(&mut self, _it: &TSTypeParameterInstantiation<'a>) {}
}
