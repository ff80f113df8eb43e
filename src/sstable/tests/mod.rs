mod tests_hardening;
mod tests_secondary;
